// Source extraction: plain text, PDF and EPUB into raw text

use anyhow::{Context, Result};
use encoding_rs::{Encoding, WINDOWS_1252};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Format of a text source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Plain,
    Pdf,
    Epub,
}

/// What the CLI should do with an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Text to be converted to speech
    Text(SourceFormat),
    /// Finished audio/video, eligible for post-processing only
    Media,
}

/// Raw text extracted from a source file
#[derive(Debug, Clone)]
pub struct Document {
    pub text: String,
    pub format: SourceFormat,
}

impl Document {
    /// Total word count (approximate)
    pub fn total_words(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Classify a path by its extension
pub fn classify(path: &Path) -> Result<InputKind> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    Ok(match ext.as_str() {
        "txt" => InputKind::Text(SourceFormat::Plain),
        "pdf" => InputKind::Text(SourceFormat::Pdf),
        "epub" => InputKind::Text(SourceFormat::Epub),
        "mp3" | "wav" | "m4a" | "mp4" => InputKind::Media,
        _ => anyhow::bail!(
            "Unsupported file type: {} (expected .txt, .pdf, .epub, .mp3, .wav, .m4a or .mp4)",
            path.display()
        ),
    })
}

/// Extract the raw text of a source file
pub fn extract(path: &Path) -> Result<Document> {
    let format = match classify(path)? {
        InputKind::Text(format) => format,
        InputKind::Media => anyhow::bail!("{} is a media file, not a text source", path.display()),
    };

    let text = match format {
        SourceFormat::Plain => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            decode_text(&bytes)
        }
        SourceFormat::Pdf => extract_pdf(path)?,
        SourceFormat::Epub => extract_epub(path)?,
    };

    Ok(Document { text, format })
}

/// Decode text bytes: a byte-order mark wins, then UTF-8, then Windows-1252
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        if !had_errors {
            return text.into_owned();
        }
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    log::debug!("Source is not UTF-8 or UTF-16, decoding as Windows-1252");
    WINDOWS_1252.decode_without_bom_handling(bytes).0.into_owned()
}

fn extract_pdf(path: &Path) -> Result<String> {
    let pdftotext = which::which("pdftotext").context(
        "pdftotext not found. Install poppler (e.g. `apt install poppler-utils` or `brew install poppler`)",
    )?;

    let output = Command::new(pdftotext)
        .arg("-layout")
        .arg(path)
        .arg("-")
        .output()
        .context("Failed to run pdftotext")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("pdftotext failed: {}", stderr.trim());
    }

    Ok(decode_text(&output.stdout))
}

fn extract_epub(path: &Path) -> Result<String> {
    let mut doc =
        epub::doc::EpubDoc::new(path).map_err(|e| anyhow::anyhow!("Failed to open EPUB: {}", e))?;

    let mut sections = Vec::new();
    let spine = doc.spine.clone();

    for spine_item in spine.iter() {
        // Get the resource content using the idref
        if let Some((content_bytes, _mime)) = doc.get_resource(&spine_item.idref) {
            let html = String::from_utf8_lossy(&content_bytes).to_string();
            let plain_text = html_to_text(&html);

            // Skip empty documents
            if !plain_text.trim().is_empty() {
                sections.push(plain_text);
            }
        }
    }

    Ok(sections.join("\n\n"))
}

/// Convert HTML to plain text
fn html_to_text(html: &str) -> String {
    let text = html2text::from_read(html.as_bytes(), 1000);
    clean_text(&text)
}

/// Clean up text rendered from HTML: one line per paragraph, no heading marks
fn clean_text(text: &str) -> String {
    let mut result = String::new();
    let mut prev_was_newline = false;

    for line in text.lines() {
        let trimmed = line.trim().trim_start_matches('#').trim_start();

        // Skip empty lines but preserve paragraph breaks
        if trimmed.is_empty() {
            if !prev_was_newline && !result.is_empty() {
                result.push_str("\n\n");
                prev_was_newline = true;
            }
            continue;
        }

        prev_was_newline = false;

        if !result.is_empty() && !result.ends_with('\n') {
            result.push(' ');
        }

        result.push_str(trimmed);
    }

    result.replace('\u{a0}', " ")
}

/// Remove characters that are invalid in file names and replace spaces with `_`
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .map(|c| if c == ' ' { '_' } else { c })
        .collect()
}

/// Sanitized file stem of a source path
pub fn output_stem(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    sanitize_file_name(&stem)
}

/// Output directory for a source: `<source dir>/<stem>_audio/`
pub fn output_dir(source: &Path) -> PathBuf {
    let parent = source.parent().unwrap_or(Path::new("."));
    parent.join(format!("{}_audio", output_stem(source)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(Path::new("livro.TXT")).unwrap(),
            InputKind::Text(SourceFormat::Plain)
        );
        assert_eq!(
            classify(Path::new("a/b.epub")).unwrap(),
            InputKind::Text(SourceFormat::Epub)
        );
        assert_eq!(classify(Path::new("fala.m4a")).unwrap(), InputKind::Media);
        assert!(classify(Path::new("planilha.xlsx")).is_err());
        assert!(classify(Path::new("sem_extensao")).is_err());
    }

    #[test]
    fn test_decode_utf8_strips_bom() {
        assert_eq!(decode_text("\u{feff}Olá".as_bytes()), "Olá");
    }

    #[test]
    fn test_decode_utf16() {
        let mut le = vec![0xFF, 0xFE];
        for unit in "Ação".encode_utf16() {
            le.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_text(&le), "Ação");

        let mut be = vec![0xFE, 0xFF];
        for unit in "Ação".encode_utf16() {
            be.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(decode_text(&be), "Ação");
    }

    #[test]
    fn test_decode_legacy_fallback() {
        // "ação" in ISO-8859-1, which Windows-1252 extends
        assert_eq!(decode_text(&[0x61, 0xE7, 0xE3, 0x6F]), "ação");
        // Windows-1252 quotes, em dash and ellipsis
        let bytes = b"\x93casa\x94\x97rua\x85";
        assert_eq!(decode_text(bytes), "\u{201c}casa\u{201d}\u{2014}rua\u{2026}");
    }

    #[test]
    fn test_extract_windows_1252_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("antigo.txt");
        // "Ela disse: “Não”—e saiu." in Windows-1252
        std::fs::write(&path, b"Ela disse: \x93N\xe3o\x94\x97e saiu.").unwrap();

        let doc = extract(&path).unwrap();
        assert_eq!(doc.text, "Ela disse: \u{201c}Não\u{201d}\u{2014}e saiu.");
        assert!(!doc.text.chars().any(|c| c.is_control()));
    }

    #[test]
    fn test_extract_plain_text() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conto.txt");
        std::fs::write(&path, "Era uma vez.\n\nFim.").unwrap();

        let doc = extract(&path).unwrap();
        assert_eq!(doc.format, SourceFormat::Plain);
        assert_eq!(doc.text, "Era uma vez.\n\nFim.");
        assert_eq!(doc.total_words(), 4);
    }

    #[test]
    fn test_extract_rejects_media() {
        assert!(extract(Path::new("/tmp/fala.mp3")).is_err());
    }

    #[test]
    fn test_clean_text() {
        let text = "# Capítulo 1\n\nPrimeira linha\n  segunda linha\n\n\n\nOutro\u{a0}parágrafo";
        assert_eq!(
            clean_text(text),
            "Capítulo 1\n\nPrimeira linha segunda linha\n\nOutro parágrafo"
        );
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("Meu Livro: Parte 1?"), "Meu_Livro_Parte_1");
        assert_eq!(sanitize_file_name("a<b>c|d*e\"f"), "abcdef");
    }

    #[test]
    fn test_output_dir() {
        assert_eq!(
            output_dir(Path::new("/livros/O Cortiço.pdf")),
            PathBuf::from("/livros/O_Cortiço_audio")
        );
        assert_eq!(output_stem(Path::new("/livros/O Cortiço.pdf")), "O_Cortiço");
    }
}
