use super::{AppContext, ReportSource, ui};
use crate::core::Holding;
use anyhow::Result;
use comfy_table::{Cell, CellAlignment};

pub fn display_holdings(holdings: &[Holding]) -> String {
    if holdings.is_empty() {
        return ui::style_text("No holdings.", ui::StyleType::Subtle);
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Account"),
        ui::header_cell("Symbol"),
        ui::header_cell("Shares"),
    ]);
    for holding in holdings {
        table.add_row(vec![
            Cell::new(holding.account),
            Cell::new(&holding.symbol),
            Cell::new(format!("{:.4}", holding.shares)).set_alignment(CellAlignment::Right),
        ]);
    }
    table.to_string()
}

pub async fn run(
    ctx: &AppContext,
    source: &ReportSource,
    account: Option<i64>,
    all: bool,
) -> Result<()> {
    let report = ctx.open_report(source, account).await?;
    let holdings = report.portfolio(!all);
    println!(
        "Holdings: {}\n\n{}",
        ui::style_text(report.id(), ui::StyleType::Title),
        display_holdings(&holdings)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_holdings() {
        let rendered = display_holdings(&[Holding {
            account: 111,
            symbol: "XEQT.TO".to_string(),
            shares: 12.5,
        }]);
        assert!(rendered.contains("111"));
        assert!(rendered.contains("XEQT.TO"));
        assert!(rendered.contains("12.5000"));
        assert!(display_holdings(&[]).contains("No holdings."));
    }
}
