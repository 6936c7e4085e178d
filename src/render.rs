const BAR_WIDTH: usize = 60;

/// Per-stock listing, one line per stock:
///
/// ```text
/// Stock assignments:
/// Stock #1: 100, 80
/// Stock #2: 75, 50, 25
/// ```
pub fn render_assignments(stocks: &[Vec<u32>]) -> String {
    let mut out = String::from("Stock assignments:\n");
    for (i, lengths) in stocks.iter().enumerate() {
        let joined = lengths
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("Stock #{}: {}\n", i + 1, joined));
    }
    out.push('\n');
    out
}

/// One stock drawn to scale. Pieces are `-` segments split by `|`, the
/// offcut is drawn with `.`; each is labelled with its length when the
/// label fits.
pub fn render_bar(stock_length: u32, lengths: &[u32]) -> String {
    if stock_length == 0 {
        return String::new();
    }
    let scale = BAR_WIDTH as f64 / stock_length as f64;

    let mut segments = Vec::with_capacity(lengths.len() + 1);
    let mut used = 0u64;
    let mut cells = 0usize;
    for &len in lengths {
        used += len as u64;
        let end = (used as f64 * scale).round() as usize;
        let width = end.saturating_sub(cells).max(1);
        cells += width;
        segments.push(segment(&len.to_string(), width, '-'));
    }

    let offcut = (stock_length as u64).saturating_sub(used);
    let rest = BAR_WIDTH.saturating_sub(cells);
    if offcut > 0 && rest > 0 {
        segments.push(segment(&offcut.to_string(), rest, '.'));
    }

    format!("[{}]\n", segments.join("|"))
}

fn segment(label: &str, width: usize, fill: char) -> String {
    if label.len() + 2 > width {
        return std::iter::repeat_n(fill, width).collect();
    }
    let left = (width - label.len()) / 2;
    let right = width - label.len() - left;
    let mut out = String::with_capacity(width);
    out.extend(std::iter::repeat_n(fill, left));
    out.push_str(label);
    out.extend(std::iter::repeat_n(fill, right));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_assignments() {
        let stocks = vec![vec![100, 80], vec![75, 50, 25]];
        assert_eq!(
            render_assignments(&stocks),
            "Stock assignments:\nStock #1: 100, 80\nStock #2: 75, 50, 25\n\n"
        );
    }

    #[test]
    fn test_render_assignments_empty() {
        assert_eq!(render_assignments(&[]), "Stock assignments:\n\n");
    }

    #[test]
    fn test_render_bar_full_stock() {
        let output = render_bar(100, &[100]);
        assert!(output.starts_with('['));
        assert!(output.ends_with("]\n"));
        assert!(output.contains("100"));
        assert!(!output.contains('.'));
        assert_eq!(output.trim_end().len(), BAR_WIDTH + 2);
    }

    #[test]
    fn test_render_bar_with_offcut() {
        let output = render_bar(200, &[100, 80]);
        assert!(output.contains("100"));
        assert!(output.contains("80"));
        assert!(output.contains(".20."));
        assert_eq!(output.matches('|').count(), 2);
    }

    #[test]
    fn test_render_bar_tiny_pieces_still_drawn() {
        let output = render_bar(10_000, &[1, 1]);
        assert_eq!(output.matches('|').count(), 2);
    }

    #[test]
    fn test_segment_label_too_wide() {
        assert_eq!(segment("1000", 3, '-'), "---");
        assert_eq!(segment("80", 6, '-'), "--80--");
    }
}
