//! Plain-text tables for `Evaluator::display`.

use lazytab_core::config::EngineConfig;
use lazytab_core::scope::Axis;
use lazytab_core::value::{render_datum, Datum};

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let keep = width.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Two-column table: the position along `axis` and the rendered value.
pub fn render_table(axis: &Axis, header: &str, values: &[Datum], config: &EngineConfig) -> String {
    let width = config.display_max_width;
    let header = truncate(header, width);
    let cells: Vec<String> = values
        .iter()
        .map(|d| truncate(&render_datum(d, &config.missing_token), width))
        .collect();

    let pos_w = values
        .len()
        .saturating_sub(1)
        .to_string()
        .len()
        .max(axis.name().chars().count());
    let val_w = cells
        .iter()
        .map(|c| c.chars().count())
        .chain(std::iter::once(header.chars().count()))
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    out.push_str(&format!("{:>pos_w$} | {}\n", axis.name(), header));
    out.push_str(&format!("{}-+-{}\n", "-".repeat(pos_w), "-".repeat(val_w)));
    for (i, cell) in cells.iter().enumerate() {
        out.push_str(&format!("{i:>pos_w$} | {cell}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazytab_core::value::Value;

    #[test]
    fn renders_missing_and_truncates() {
        let cfg = EngineConfig {
            display_max_width: 6,
            ..EngineConfig::default()
        };
        let table = render_table(
            &Axis::row(),
            "x",
            &[Some(Value::from("abcdefghij")), None],
            &cfg,
        );
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "row | x");
        assert_eq!(lines[2], "  0 | abc...");
        assert_eq!(lines[3], "  1 | NA");
    }
}
