use crate::models::ReferenceRecord;

/// Characters that are unsafe in file names on common filesystems, with their stand-ins.
pub const FILENAME_SUBSTITUTIONS: [(char, char); 24] = [
    ('#', '_'),
    ('%', '_'),
    ('&', '_'),
    ('{', '('),
    ('}', ')'),
    ('\\', '-'),
    ('<', '.'),
    ('>', '.'),
    ('*', '_'),
    ('?', '_'),
    ('/', '-'),
    (' ', '_'),
    ('$', '_'),
    ('!', '_'),
    ('\'', '_'),
    ('"', '_'),
    (':', '.'),
    ('@', '_'),
    ('+', '_'),
    ('`', '.'),
    ('|', '-'),
    ('=', '_'),
    ('[', '('),
    (']', ')'),
];

pub fn sanitize_component(text: &str) -> String {
    text.chars()
        .map(|c| {
            FILENAME_SUBSTITUTIONS
                .iter()
                .find(|(bad, _)| *bad == c)
                .map_or(c, |(_, good)| *good)
        })
        .filter(|c| !c.is_control())
        .collect()
}

/// `<author> (<year>) <title>` cut to `max_stem_len` characters, plus `.pdf`.
pub fn document_file_name(record: &ReferenceRecord, max_stem_len: usize) -> String {
    let stem = format!(
        "{} ({}) {}",
        sanitize_component(&record.first_author),
        record.year,
        sanitize_component(&record.title)
    );
    let stem: String = stem.chars().take(max_stem_len).collect();
    format!("{stem}.pdf")
}
