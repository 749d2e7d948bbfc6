use super::ui;
use crate::core::UsageReport;
use anyhow::{Result, bail};
use chrono::NaiveDate;
use comfy_table::Cell;

const TOP_LIMIT: usize = 10;

/// Checks a `YYYY-MM` month argument.
pub fn validate_month(month: &str) -> Result<()> {
    if month.len() != 7 || NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d").is_err() {
        bail!("Invalid month '{month}', expected YYYY-MM");
    }
    Ok(())
}

pub async fn render(report: &dyn UsageReport, month: &str) -> String {
    let stats = report.monthly_stats(month).await;

    let mut monthly = ui::new_styled_table();
    monthly.set_header(vec![ui::header_cell("Metric"), ui::header_cell("Value")]);
    for (label, value) in [
        ("Active users", stats.active_users),
        ("New users", stats.new_users),
        ("Total users", stats.total_users),
        ("Commands", stats.total_commands),
        ("Conversions", stats.total_conversions),
    ] {
        monthly.add_row(vec![Cell::new(label), ui::count_cell(value)]);
    }

    let mut commands = ui::new_styled_table();
    commands.set_header(vec![ui::header_cell("Command"), ui::header_cell("Uses")]);
    for command in report.top_commands(TOP_LIMIT).await {
        commands.add_row(vec![
            Cell::new(format!("/{}", command.name)),
            ui::count_cell(command.count),
        ]);
    }

    let mut conversions = ui::new_styled_table();
    conversions.set_header(vec![
        ui::header_cell("From"),
        ui::header_cell("To"),
        ui::header_cell("Conversions"),
    ]);
    for pair in report.popular_conversions(TOP_LIMIT).await {
        conversions.add_row(vec![
            Cell::new(&pair.from),
            Cell::new(&pair.to),
            ui::count_cell(pair.count),
        ]);
    }

    let mut output = format!(
        "Usage for {}\n\n",
        ui::style_text(month, ui::StyleType::Title)
    );
    output.push_str(&monthly.to_string());
    output.push_str("\n\nTop commands\n");
    output.push_str(&commands.to_string());
    output.push_str("\n\nPopular conversions\n");
    output.push_str(&conversions.to_string());
    output.push_str(&format!(
        "\n\n{} {}",
        ui::style_text("Users overall:", ui::StyleType::TotalLabel),
        ui::style_text(
            &report.user_count().await.to_string(),
            ui::StyleType::TotalValue
        )
    ));
    output
}

pub async fn run(report: &dyn UsageReport, month: &str) -> Result<()> {
    validate_month(month)?;
    println!("{}", render(report, month).await);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AnalyticsSink, ChatUser, CurrencyCode, UserId};
    use crate::store::memory::MemoryCollection;
    use crate::store::usage::UsageLog;
    use std::sync::Arc;

    fn march() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn test_validate_month() {
        assert!(validate_month("2024-03").is_ok());
        assert!(validate_month("2024-13").is_err());
        assert!(validate_month("2024-3").is_err());
        assert!(validate_month("March").is_err());
    }

    #[tokio::test]
    async fn test_render_includes_all_sections() {
        let log = UsageLog::new(Arc::new(MemoryCollection::new())).with_clock(march);
        log.record_user_seen(&ChatUser::new(1)).await;
        log.record_command("compare", UserId(1)).await;
        log.record_conversion(
            &CurrencyCode::new("GBP").unwrap(),
            &CurrencyCode::new("INR").unwrap(),
            3.0,
            UserId(1),
        )
        .await;

        let output = console::strip_ansi_codes(&render(&log, "2024-03").await).to_string();

        assert!(output.contains("Usage for 2024-03"));
        assert!(output.contains("Active users"));
        assert!(output.contains("/compare"));
        assert!(output.contains("GBP"));
        assert!(output.contains("INR"));
        assert!(output.ends_with("Users overall: 1"));
    }
}
