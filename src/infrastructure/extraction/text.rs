/// Decode text-like attachments, replacing invalid UTF-8 and dropping a BOM.
pub(super) fn extract(bytes: &[u8]) -> String {
    let decoded = String::from_utf8_lossy(bytes);
    decoded.trim_start_matches('\u{feff}').to_string()
}
