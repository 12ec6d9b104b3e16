use crate::domain::error::{AppError, Result};

/// Paragraph text and table rows (cells joined with ` | `), one per line.
pub(super) fn extract(bytes: &[u8]) -> Result<String> {
    let docx = docx_rs::read_docx(bytes)
        .map_err(|e| AppError::ExtractionError(format!("Failed to parse DOCX file: {}", e)))?;

    let mut lines = Vec::new();
    for child in &docx.document.children {
        document_child(child, &mut lines);
    }
    Ok(lines.join("\n"))
}

fn document_child(child: &docx_rs::DocumentChild, lines: &mut Vec<String>) {
    match child {
        docx_rs::DocumentChild::Paragraph(paragraph) => {
            let text = paragraph_text(paragraph);
            if !text.trim().is_empty() {
                lines.push(text);
            }
        }
        docx_rs::DocumentChild::Table(table) => table_lines(table, lines),
        _ => {}
    }
}

fn paragraph_text(paragraph: &docx_rs::Paragraph) -> String {
    let mut buffer = String::new();
    for child in &paragraph.children {
        paragraph_child(child, &mut buffer);
    }
    buffer
}

fn paragraph_child(child: &docx_rs::ParagraphChild, buffer: &mut String) {
    match child {
        docx_rs::ParagraphChild::Run(run) => run_text(run, buffer),
        docx_rs::ParagraphChild::Hyperlink(link) => {
            for link_child in &link.children {
                paragraph_child(link_child, buffer);
            }
        }
        docx_rs::ParagraphChild::Insert(insert) => {
            for insert_child in &insert.children {
                if let docx_rs::InsertChild::Run(run) = insert_child {
                    run_text(run, buffer);
                }
            }
        }
        _ => {}
    }
}

fn run_text(run: &docx_rs::Run, buffer: &mut String) {
    for child in &run.children {
        match child {
            docx_rs::RunChild::Text(text) => buffer.push_str(&text.text),
            docx_rs::RunChild::Tab(_) | docx_rs::RunChild::PTab(_) => buffer.push('\t'),
            docx_rs::RunChild::Break(_) => buffer.push('\n'),
            docx_rs::RunChild::Sym(sym) => buffer.push_str(&sym.char),
            _ => {}
        }
    }
}

fn table_lines(table: &docx_rs::Table, lines: &mut Vec<String>) {
    for row in &table.rows {
        let docx_rs::TableChild::TableRow(row) = row;
        let cells: Vec<String> = row
            .cells
            .iter()
            .map(|cell| {
                let docx_rs::TableRowChild::TableCell(cell) = cell;
                cell_text(cell)
            })
            .filter(|text| !text.trim().is_empty())
            .collect();
        if !cells.is_empty() {
            lines.push(cells.join(" | "));
        }
    }
}

fn cell_text(cell: &docx_rs::TableCell) -> String {
    let mut parts = Vec::new();
    for content in &cell.children {
        match content {
            docx_rs::TableCellContent::Paragraph(paragraph) => {
                let text = paragraph_text(paragraph);
                if !text.trim().is_empty() {
                    parts.push(text);
                }
            }
            docx_rs::TableCellContent::Table(table) => {
                let mut nested = Vec::new();
                table_lines(table, &mut nested);
                if !nested.is_empty() {
                    parts.push(nested.join(" "));
                }
            }
            _ => {}
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{Docx, Paragraph, Run, Table, TableCell, TableRow};

    fn build(docx: Docx) -> Vec<u8> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        docx.build().pack(&mut cursor).expect("pack docx");
        cursor.into_inner()
    }

    #[test]
    fn extracts_paragraphs_and_tables() {
        let docx = Docx::new()
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Acceptance criteria")))
            .add_table(Table::new(vec![TableRow::new(vec![
                TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text("Field"))),
                TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text("Email"))),
            ])]));

        let text = extract(&build(docx)).unwrap();
        assert_eq!(text, "Acceptance criteria\nField | Email");
    }
}
