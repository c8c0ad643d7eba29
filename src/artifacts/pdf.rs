// Single-page PDF output with the page embedded as a Flate-compressed RGB image

use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::RgbImage;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Resolution the page image is assumed to have
pub const PAGE_DPI: u32 = 150;

/// Encode `page` as a one-page PDF document
pub fn encode_image_pdf(page: &RgbImage) -> io::Result<Vec<u8>> {
    let (width, height) = page.dimensions();
    let width_pt = points(width);
    let height_pt = points(height);

    let mut compressor = ZlibEncoder::new(Vec::new(), Compression::default());
    compressor.write_all(page.as_raw())?;
    let pixels = compressor.finish()?;

    let content = format!("q {width_pt} 0 0 {height_pt} 0 0 cm /Im0 Do Q\n");

    let mut doc = PdfWriter::new();
    doc.object(b"<< /Type /Catalog /Pages 2 0 R >>");
    doc.object(b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>");
    doc.object(
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {width_pt} {height_pt}] \
             /Resources << /XObject << /Im0 4 0 R >> >> /Contents 5 0 R >>"
        )
        .as_bytes(),
    );
    doc.stream(
        &format!(
            "/Type /XObject /Subtype /Image /Width {width} /Height {height} \
             /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /FlateDecode"
        ),
        &pixels,
    );
    doc.stream("", content.as_bytes());
    Ok(doc.finish())
}

/// Write `page` to `path` as a one-page PDF
pub fn write_image_pdf(page: &RgbImage, path: &Path) -> io::Result<()> {
    fs::write(path, encode_image_pdf(page)?)
}

fn points(pixels: u32) -> String {
    format!("{:.2}", f64::from(pixels) * 72.0 / f64::from(PAGE_DPI))
}

/// Sequential object writer tracking xref offsets
struct PdfWriter {
    buf: Vec<u8>,
    offsets: Vec<usize>,
}

impl PdfWriter {
    fn new() -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        Self {
            buf,
            offsets: Vec::new(),
        }
    }

    fn begin(&mut self) {
        self.offsets.push(self.buf.len());
        let header = format!("{} 0 obj\n", self.offsets.len());
        self.buf.extend_from_slice(header.as_bytes());
    }

    fn object(&mut self, body: &[u8]) {
        self.begin();
        self.buf.extend_from_slice(body);
        self.buf.extend_from_slice(b"\nendobj\n");
    }

    fn stream(&mut self, dict_entries: &str, data: &[u8]) {
        self.begin();
        let dict = if dict_entries.is_empty() {
            format!("<< /Length {} >>\nstream\n", data.len())
        } else {
            format!("<< {} /Length {} >>\nstream\n", dict_entries, data.len())
        };
        self.buf.extend_from_slice(dict.as_bytes());
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
    }

    fn finish(mut self) -> Vec<u8> {
        let xref_offset = self.buf.len();
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", self.offsets.len() + 1);
        for offset in &self.offsets {
            xref.push_str(&format!("{:010} 00000 n \n", offset));
        }
        xref.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            self.offsets.len() + 1,
            xref_offset
        ));
        self.buf.extend_from_slice(xref.as_bytes());
        self.buf
    }
}
