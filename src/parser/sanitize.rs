//! Text normalization shared by every channel parser.

/// Strip zero-width/invisible characters, normalize unicode dash variants to
/// ASCII `-`, and drop blank lines, so individual parsers see a predictable
/// surface form. Casing and numeric tokens are left untouched here; each
/// parser decides its own case-folding and number-parsing rules since some
/// channels use commas as decimal separators and some use them as thousands
/// separators.
#[must_use]
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{feff}' => continue,
            '\u{2010}'..='\u{2015}' => out.push('-'),
            '\r' => continue,
            _ => out.push(ch),
        }
    }

    out.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
