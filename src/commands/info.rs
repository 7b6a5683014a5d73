use crate::pdf::PdfDocument;
use anyhow::Result;
use std::path::Path;

pub fn run<P: AsRef<Path>>(path: P) -> Result<()> {
    let doc = PdfDocument::open(&path)?;

    println!("File: {}", path.as_ref().display());
    println!("Pages: {}", doc.page_count());

    for (key, value) in doc.info_entries() {
        if key.ends_with("Date") {
            println!("{}: {}", key, format_pdf_date(&value));
        } else {
            println!("{}: {}", key, value);
        }
    }

    Ok(())
}

fn format_pdf_date(date: &str) -> String {
    // PDF date format: D:YYYYMMDDHHmmSSOHH'mm
    if let Some(d) = date.strip_prefix("D:") {
        if d.len() >= 8 && d.is_char_boundary(8) {
            let time = if d.len() >= 14 && d.is_char_boundary(14) {
                format!(" {}:{}:{}", &d[8..10], &d[10..12], &d[12..14])
            } else {
                String::new()
            };
            return format!("{}-{}-{}{}", &d[0..4], &d[4..6], &d[6..8], time);
        }
    }
    date.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pdf_date() {
        assert_eq!(format_pdf_date("D:20240131120501Z"), "2024-01-31 12:05:01");
        assert_eq!(format_pdf_date("D:20240131"), "2024-01-31");
        assert_eq!(format_pdf_date("yesterday"), "yesterday");
    }
}
