//! Terminal colour helpers for human-facing batch output

use console::{style, Style};

pub fn success() -> Style {
    Style::new().green().bold()
}

pub fn error() -> Style {
    Style::new().red().bold()
}

pub fn warning() -> Style {
    Style::new().yellow()
}

pub fn dim() -> Style {
    Style::new().dim()
}

/// Size reduction with a sign-dependent colour: saved space is green, growth red.
pub fn fmt_reduction(pct: f64) -> String {
    if pct > 0.0 {
        format!("{}", style(format!("{:.1}%", pct)).green().bold())
    } else if pct > -5.0 {
        format!("{}", style(format!("{:.1}%", pct)).yellow())
    } else {
        format!("{}", style(format!("{:.1}%", pct)).red())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_reduction_keeps_value() {
        console::set_colors_enabled(false);
        assert_eq!(fmt_reduction(42.0), "42.0%");
        assert_eq!(fmt_reduction(-3.25), "-3.2%");
        assert_eq!(fmt_reduction(-50.0), "-50.0%");
    }
}
