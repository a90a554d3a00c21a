//! Deterministic text normalization applied before content reaches disk.

const BOM: char = '\u{feff}';

/// Line ending used when writing content back to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Strip every leading byte-order mark.
///
/// Malformed producers may stack several marks, so this loops until none
/// remain; `strip(strip(x)) == strip(x)` for every input.
pub fn normalize_byte_order_marks(content: &str) -> &str {
    let mut rest = content;
    while let Some(stripped) = rest.strip_prefix(BOM) {
        rest = stripped;
    }
    rest
}

/// Pick the line ending for a write based on the file's original content.
///
/// Any CRLF in the original selects CRLF; everything else (including empty
/// originals for newly created files) uses LF.
pub fn detect_line_ending(original: &str) -> LineEnding {
    if original.contains("\r\n") {
        LineEnding::CrLf
    } else {
        LineEnding::Lf
    }
}

/// Rewrite every `\n` / `\r\n` in `content` to `ending`.
pub fn normalize_line_endings(content: &str, ending: LineEnding) -> String {
    let lf = content.replace("\r\n", "\n");
    match ending {
        LineEnding::Lf => lf,
        LineEnding::CrLf => lf.replace('\n', "\r\n"),
    }
}

/// Drop a possibly incomplete trailing line from streamed content.
///
/// Keeps everything up to and including the last newline. Content without a
/// newline has no complete line yet and truncates to empty.
pub fn drop_partial_last_line(content: &str) -> &str {
    match content.rfind('\n') {
        Some(idx) => &content[..=idx],
        None => "",
    }
}

/// Append a newline when the original ended with one and the update lost it.
pub fn preserve_trailing_newline(original: &str, content: &str) -> String {
    if original.ends_with('\n') && !content.is_empty() && !content.ends_with('\n') {
        format!("{content}\n")
    } else {
        content.to_string()
    }
}

/// Full normalization pipeline for bytes about to be written.
pub fn normalize_for_write(content: &str, original: &str) -> String {
    let stripped = normalize_byte_order_marks(content);
    normalize_line_endings(stripped, detect_line_ending(original))
}

/// Number of lines as an editor would display them.
pub fn line_count(content: &str) -> usize {
    if content.is_empty() {
        return 0;
    }
    let newlines = content.matches('\n').count();
    if content.ends_with('\n') {
        newlines
    } else {
        newlines + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bom_normalization_is_idempotent() {
        let inputs = [
            "",
            "plain",
            "\u{feff}one",
            "\u{feff}\u{feff}\u{feff}stacked",
            "\u{feff}",
            "\u{feff}\u{feff}",
            "mid\u{feff}dle",
            "\u{feff}lead and mid\u{feff}",
        ];
        for input in inputs {
            let once = normalize_byte_order_marks(input);
            let twice = normalize_byte_order_marks(once);
            assert_eq!(once, twice, "input {input:?}");
            assert!(!once.starts_with(BOM), "input {input:?}");
        }
    }

    #[test]
    fn bom_normalization_keeps_interior_marks() {
        assert_eq!(normalize_byte_order_marks("a\u{feff}b"), "a\u{feff}b");
        assert_eq!(normalize_byte_order_marks("\u{feff}\u{feff}a"), "a");
    }

    #[test]
    fn crlf_original_selects_crlf() {
        assert_eq!(detect_line_ending("a\r\nb\r\n"), LineEnding::CrLf);
        assert_eq!(detect_line_ending("a\nb\n"), LineEnding::Lf);
        assert_eq!(detect_line_ending(""), LineEnding::Lf);
    }

    #[test]
    fn normalize_line_endings_handles_mixed_input() {
        assert_eq!(
            normalize_line_endings("a\r\nb\nc", LineEnding::CrLf),
            "a\r\nb\r\nc"
        );
        assert_eq!(normalize_line_endings("a\r\nb\nc", LineEnding::Lf), "a\nb\nc");
    }

    #[test]
    fn partial_last_line_is_dropped() {
        assert_eq!(drop_partial_last_line("a\nb\nc"), "a\nb\n");
        assert_eq!(drop_partial_last_line("a\nb\n"), "a\nb\n");
        assert_eq!(drop_partial_last_line("abc"), "");
        assert_eq!(drop_partial_last_line(""), "");
    }

    #[test]
    fn trailing_newline_is_preserved_from_original() {
        assert_eq!(preserve_trailing_newline("a\n", "b"), "b\n");
        assert_eq!(preserve_trailing_newline("a\n", "b\n"), "b\n");
        assert_eq!(preserve_trailing_newline("a", "b"), "b");
        assert_eq!(preserve_trailing_newline("a\n", ""), "");
    }

    #[test]
    fn normalize_for_write_strips_marks_and_matches_original_endings() {
        let out = normalize_for_write("\u{feff}\u{feff}x\ny\n", "old\r\n");
        assert_eq!(out, "x\r\ny\r\n");
    }

    #[test]
    fn line_count_matches_editor_view() {
        assert_eq!(line_count(""), 0);
        assert_eq!(line_count("a"), 1);
        assert_eq!(line_count("a\n"), 1);
        assert_eq!(line_count("a\nb"), 2);
        assert_eq!(line_count("a\nb\n"), 2);
    }
}
