use indicatif::{ProgressState, ProgressStyle};

/// Shared function to pull our progress bar styling
/// # Arguments
/// * `unit` - label for the counted items, e.g. "VCFs"
pub fn get_progress_style(unit: &str) -> ProgressStyle {
    let template = format!("[{{elapsed_precise}}] {{bar:40.cyan/blue}} {{pos}}/{{len}} {unit} ({{percent}}); ETA: {{eta_precise}} {{msg}}");
    ProgressStyle::with_template(&template)
        .unwrap_or_else(|_e| ProgressStyle::default_bar())
        .with_key("percent", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
            let _ = write!(w, "{:.1}%", state.fraction()*100.0);
        })
        .progress_chars("##-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_style() {
        let bar = indicatif::ProgressBar::hidden().with_style(get_progress_style("VCFs"));
        bar.set_length(4);
        bar.inc(1);
        assert_eq!(bar.position(), 1);
    }
}
