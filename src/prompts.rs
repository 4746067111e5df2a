//! OCR instruction sent alongside every file.
//!
//! Centralising the prompt here keeps it in one place and lets unit tests
//! inspect it directly without a live service. Callers can override the
//! template via [`crate::config::BatchConfig::instruction`]; the constant
//! below is used only when no override is provided.

/// Placeholder replaced with `PDF` or `image`.
pub const FILE_KIND_PLACEHOLDER: &str = "{file_kind}";

/// Placeholder replaced with the file's display name.
pub const FILE_NAME_PLACEHOLDER: &str = "{file_name}";

/// Header labels used when the result carries no `headers` of its own.
pub const DEFAULT_HEADERS: [&str; 2] = ["Item", "Value"];

/// Default instruction template. Identical for documents and images apart from
/// the two placeholders.
pub const DEFAULT_INSTRUCTION: &str = r#"Extract all text and numeric information from this {file_kind} file "{file_name}".

Follow these rules:
1. If the file contains tables, preserve the table structure
2. Extract only text and numbers (exclude decorations, graphics and shapes)
3. Recognise Japanese, English and digits accurately
4. For receipts, invoices, business forms and similar documents, extract items and their values
5. Output JSON only, with no markdown and no explanations

JSON format:
{
  "headers": ["Column 1", "Column 2", "Column 3", ...],
  "rows": [
    ["Value 1-1", "Value 1-2", "Value 1-3", ...],
    ["Value 2-1", "Value 2-2", "Value 2-3", ...],
    ...
  ]
}

If there is no table, or the content is plain text:
{
  "headers": ["Item", "Value"],
  "rows": [
    ["Item 1", "Value 1"],
    ["Item 2", "Value 2"],
    ...
  ]
}"#;

/// Fill the instruction template for one file.
pub fn render_instruction(template: &str, file_kind: &str, file_name: &str) -> String {
    template
        .replace(FILE_KIND_PLACEHOLDER, file_kind)
        .replace(FILE_NAME_PLACEHOLDER, file_name)
}
