// 🧾 Page Text - what the extractors get to see of a page
//
// html5ever never rejects input, so malformed markup degrades to less text
// (or no table) rather than an error.

use scraper::{ElementRef, Html, Selector};

/// Visible text of a document: text nodes outside <script>/<style>,
/// trimmed and joined with single spaces
pub fn page_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut parts: Vec<&str> = Vec::new();

    for node in doc.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map(|e| matches!(e.name(), "script" | "style"))
                .unwrap_or(false)
        });
        if hidden {
            continue;
        }
        let t = text.trim();
        if !t.is_empty() {
            parts.push(t);
        }
    }

    parts.join(" ")
}

/// Concatenated contents of every inline <script> (embedded JSON often
/// carries the figures a page renders client-side)
pub fn script_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let Ok(sel) = Selector::parse("script") else {
        return String::new();
    };

    doc.select(&sel)
        .map(|s| s.text().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Everything a text-pattern extractor searches: visible text, then inline
/// script text
pub fn searchable_text(html: &str) -> String {
    format!("{} {}", page_text(html), script_text(html))
}

fn cell_text(el: &ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cell texts of every `tbody tr` in the first table inside `container`
///
/// None when the container or its table is absent.
pub fn table_rows(html: &str, container: &str) -> Option<Vec<Vec<String>>> {
    let doc = Html::parse_document(html);
    let container_sel = Selector::parse(container).ok()?;
    let table_sel = Selector::parse("table").ok()?;
    let row_sel = Selector::parse("tbody tr").ok()?;
    let cell_sel = Selector::parse("td").ok()?;

    let holder = doc.select(&container_sel).next()?;
    let table = holder.select(&table_sel).next()?;

    let rows = table
        .select(&row_sel)
        .map(|tr| tr.select(&cell_sel).map(|td| cell_text(&td)).collect())
        .collect();

    Some(rows)
}

/// A table row attributed to its row group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedRow {
    pub group: String,
    pub cells: Vec<String>,
}

/// Resolve row-group carryover in a (group, value, term) table
///
/// A 3-cell row with a non-blank first cell opens a group; a 2-cell row (or
/// a 3-cell row whose first cell is blank) belongs to the most recent group.
/// Other shapes are skipped. Rows before any group carry an empty group name.
pub fn grouped_rows(rows: &[Vec<String>]) -> Vec<GroupedRow> {
    let mut current = String::new();
    let mut out = Vec::new();

    for row in rows {
        let cells = match row.len() {
            3 => {
                let group = row[0].trim();
                if !group.is_empty() {
                    current = group.to_string();
                }
                row[1..].to_vec()
            }
            2 => row.clone(),
            _ => continue,
        };
        out.push(GroupedRow {
            group: current.clone(),
            cells: cells.into_iter().map(|c| c.trim().to_string()).collect(),
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_page_text_skips_scripts_and_joins_nodes() {
        let html = r#"<html><head><style>.x{}</style><script>var fee = "9%";</script></head>
            <body><p>Débito</p><p>0,8%   + IVA</p></body></html>"#;

        let text = page_text(html);
        assert_eq!(text, "Débito 0,8%   + IVA");
    }

    #[test]
    fn test_script_text() {
        let html = r#"<body><script>{"debito":"2,9%"}</script><p>hola</p></body>"#;
        assert_eq!(script_text(html), r#"{"debito":"2,9%"}"#);
    }

    #[test]
    fn test_searchable_text_keeps_script_payloads() {
        let html = r#"<body><h2>Débito</h2><script>var caps = {"tope": "0,8%"};</script></body>"#;
        assert_eq!(searchable_text(html), r#"Débito var caps = {"tope": "0,8%"};"#);
    }

    #[test]
    fn test_table_rows_from_container() {
        let html = r#"<div id="otra"><table><tbody><tr><td>x</td></tr></tbody></table></div>
            <div id="tabla1"><table>
              <thead><tr><th>Medio</th><th>Costo</th><th>Plazo</th></tr></thead>
              <tbody>
                <tr><td>Tarjeta de crédito</td><td>6,29%</td><td>Al instante</td></tr>
                <tr><td>3,25%</td><td>10 días</td></tr>
              </tbody>
            </table></div>"#;

        let rows = table_rows(html, "div#tabla1").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], row(&["Tarjeta de crédito", "6,29%", "Al instante"]));
        assert_eq!(rows[1], row(&["3,25%", "10 días"]));
    }

    #[test]
    fn test_table_rows_missing_container_or_table() {
        assert!(table_rows("<p>sin tabla</p>", "div#tabla1").is_none());
        assert!(table_rows(r#"<div id="tabla1">vacío</div>"#, "div#tabla1").is_none());
    }

    #[test]
    fn test_row_group_carryover() {
        let rows = vec![
            row(&["Crédito", "1.8%", "8 días"]),
            row(&["", "2.0%", "14 días"]),
        ];
        let grouped = grouped_rows(&rows);
        assert_eq!(grouped.len(), 2);
        assert!(grouped.iter().all(|r| r.group == "Crédito"));
        assert_eq!(grouped[1].cells, row(&["2.0%", "14 días"]));

        let rows = vec![row(&["Crédito", "1.8%", "8 días"]), row(&["2.0%", "14 días"])];
        let grouped = grouped_rows(&rows);
        assert_eq!(grouped.len(), 2);
        assert!(grouped.iter().all(|r| r.group == "Crédito"));
        assert_eq!(grouped[1].cells, row(&["2.0%", "14 días"]));
    }

    #[test]
    fn test_odd_rows_are_skipped() {
        let rows = vec![
            row(&["Nota al pie"]),
            row(&["Débito", "0,8%", "Al instante"]),
            row(&["a", "b", "c", "d"]),
        ];
        let grouped = grouped_rows(&rows);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].group, "Débito");
    }
}
