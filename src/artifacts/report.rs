//! Fixed-layout run report.
//!
//! The page shows, top to bottom: the title, run metadata, the numbered
//! step list, the final result text and a colour-coded status badge. It is
//! drawn onto a [`Canvas`] and written out as a single-page PDF.

use chrono::{DateTime, Utc};
use image::RgbImage;
use std::path::Path;

use super::ArtifactResult;
use super::canvas::{Canvas, GLYPH_SIZE, glyphs_per_line, wrap_text};
use super::pdf::write_image_pdf;
use crate::orchestrator::{Step, StructuredResult, TestStatus};

/// A4 at 150 dpi
const PAGE_WIDTH: u32 = 1240;
const MIN_PAGE_HEIGHT: u32 = 1754;
const MARGIN: u32 = 72;

const TITLE_SCALE: u32 = 4;
const HEADING_SCALE: u32 = 3;
const BODY_SCALE: u32 = 2;

const BACKGROUND: [u8; 3] = [255, 255, 255];
const INK: [u8; 3] = [20, 20, 20];
const MUTED: [u8; 3] = [110, 110, 110];
const RULE: [u8; 3] = [200, 200, 200];

/// Content of a run report
#[derive(Debug, Clone)]
pub struct ReportDocument {
    pub title: String,
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub steps: Vec<Step>,
    pub final_text: String,
    pub status: TestStatus,
}

impl ReportDocument {
    /// Report for `result`, with `final_text` overriding the agent's text
    pub fn new(run_id: impl Into<String>, result: &StructuredResult, final_text: impl Into<String>) -> Self {
        Self {
            title: "Test Report".to_string(),
            run_id: run_id.into(),
            generated_at: Utc::now(),
            steps: result.steps.clone(),
            final_text: final_text.into(),
            status: result.status,
        }
    }
}

/// Render the report and write it to `path` as PDF
pub fn write_report(doc: &ReportDocument, path: &Path) -> ArtifactResult<()> {
    let page = render_page(doc);
    write_image_pdf(&page, path)?;
    Ok(())
}

/// One line of laid-out text
#[derive(Debug, Clone, PartialEq)]
struct Line {
    text: String,
    indent: u32,
    scale: u32,
    color: [u8; 3],
    gap_before: u32,
}

impl Line {
    fn new(text: impl Into<String>, scale: u32, color: [u8; 3]) -> Self {
        Self {
            text: text.into(),
            indent: 0,
            scale,
            color,
            gap_before: 0,
        }
    }

    fn indent(mut self, indent: u32) -> Self {
        self.indent = indent;
        self
    }

    fn gap(mut self, gap: u32) -> Self {
        self.gap_before = gap;
        self
    }

    fn height(&self) -> u32 {
        self.gap_before + GLYPH_SIZE * self.scale + self.scale * 4
    }
}

/// Lay out every line of the page except the status badge
fn layout(doc: &ReportDocument) -> Vec<Line> {
    let content_width = PAGE_WIDTH - 2 * MARGIN;
    let mut lines = vec![
        Line::new(&doc.title, TITLE_SCALE, INK),
        Line::new(format!("Run: {}", doc.run_id), BODY_SCALE, MUTED).gap(8),
        Line::new(
            format!("Generated: {}", doc.generated_at.format("%Y-%m-%d %H:%M:%S UTC")),
            BODY_SCALE,
            MUTED,
        ),
        Line::new("Steps", HEADING_SCALE, INK).gap(32),
    ];

    if doc.steps.is_empty() {
        lines.push(Line::new("No steps reported.", BODY_SCALE, MUTED).gap(8));
    }
    for (i, step) in doc.steps.iter().enumerate() {
        let label = format!("{}. ", i + 1);
        let indent = label.len() as u32 * GLYPH_SIZE * BODY_SCALE;
        let width = glyphs_per_line(content_width - indent, BODY_SCALE);
        let text = format!("{}: {}", step.action, step.description);
        for (n, chunk) in wrap_text(&text, width).into_iter().enumerate() {
            let line = if n == 0 {
                Line::new(format!("{}{}", label, chunk), BODY_SCALE, INK).gap(8)
            } else {
                Line::new(chunk, BODY_SCALE, INK).indent(indent)
            };
            lines.push(line);
        }
    }

    lines.push(Line::new("Final Result", HEADING_SCALE, INK).gap(32));
    let width = glyphs_per_line(content_width, BODY_SCALE);
    for (n, chunk) in wrap_text(&doc.final_text, width).into_iter().enumerate() {
        let gap = if n == 0 { 8 } else { 0 };
        lines.push(Line::new(chunk, BODY_SCALE, INK).gap(gap));
    }
    lines
}

/// Render the report page
pub fn render_page(doc: &ReportDocument) -> RgbImage {
    let lines = layout(doc);
    let badge_height = GLYPH_SIZE * HEADING_SCALE + 24;
    let content_height: u32 = lines.iter().map(Line::height).sum::<u32>() + 32 + badge_height;
    let height = (content_height + 2 * MARGIN).max(MIN_PAGE_HEIGHT);

    let mut canvas = Canvas::with_color(PAGE_WIDTH, height, BACKGROUND);
    let mut y = MARGIN;
    for (i, line) in lines.iter().enumerate() {
        y += line.gap_before;
        if line.scale == HEADING_SCALE && i > 0 {
            canvas.draw_rect(MARGIN, y - 12, PAGE_WIDTH - 2 * MARGIN, 2, RULE);
        }
        canvas.draw_text_scaled(MARGIN + line.indent, y, &line.text, line.scale, line.color, BACKGROUND);
        y += line.height() - line.gap_before;
    }

    y += 32;
    let label = format!("Status: {}", doc.status.as_str().to_uppercase());
    let badge_width = label.len() as u32 * GLYPH_SIZE * HEADING_SCALE + 32;
    let color = status_color(doc.status);
    canvas.draw_rect(MARGIN, y, badge_width, badge_height, color);
    canvas.draw_text_scaled(MARGIN + 16, y + 12, &label, HEADING_SCALE, BACKGROUND, color);

    canvas.into_image()
}

fn status_color(status: TestStatus) -> [u8; 3] {
    match status {
        TestStatus::Success => [34, 139, 34],
        TestStatus::Fail => [190, 30, 45],
        TestStatus::Unknown => [120, 120, 120],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(steps: usize, status: TestStatus) -> ReportDocument {
        let result = StructuredResult {
            steps: (0..steps)
                .map(|i| Step {
                    action: format!("action {}", i),
                    description: "filled the email field and waited for the form".to_string(),
                })
                .collect(),
            final_text: "Logged in and found the Courses tab".to_string(),
            status,
        };
        ReportDocument::new("run_test", &result, result.final_text.clone())
    }

    #[test]
    fn test_layout_numbers_steps() {
        let lines = layout(&doc(2, TestStatus::Success));
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts[0], "Test Report");
        assert!(texts.iter().any(|t| t.starts_with("1. action 0:")));
        assert!(texts.iter().any(|t| t.starts_with("2. action 1:")));
        assert!(texts.contains(&"Final Result"));
        assert!(texts.contains(&"Logged in and found the Courses tab"));
    }

    #[test]
    fn test_layout_without_steps() {
        let lines = layout(&doc(0, TestStatus::Fail));
        assert!(lines.iter().any(|l| l.text == "No steps reported."));
    }

    #[test]
    fn test_long_step_lists_grow_the_page() {
        let short = render_page(&doc(1, TestStatus::Success));
        let long = render_page(&doc(80, TestStatus::Success));
        assert_eq!(short.width(), PAGE_WIDTH);
        assert_eq!(short.height(), MIN_PAGE_HEIGHT);
        assert!(long.height() > MIN_PAGE_HEIGHT);
    }

    #[test]
    fn test_badge_uses_status_color() {
        let page = render_page(&doc(0, TestStatus::Fail));
        let found = page.pixels().any(|p| p.0 == status_color(TestStatus::Fail));
        assert!(found);
    }

    #[test]
    fn test_write_report_creates_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        write_report(&doc(3, TestStatus::Unknown), &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }
}
