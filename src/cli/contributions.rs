use super::{AppContext, ReportSource, ui};
use crate::core::ChartPoint;
use anyhow::Result;
use comfy_table::Cell;

pub fn display_cumsum(points: &[ChartPoint]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Date"), ui::header_cell("Cumulative Net (CAD)")]);
    for point in points {
        table.add_row(vec![Cell::new(point.x), ui::amount_cell(point.y)]);
    }
    table.to_string()
}

/// Prints the running total of net amounts, as a table or as chart JSON.
pub async fn run(ctx: &AppContext, source: &ReportSource, json: bool) -> Result<()> {
    let report = ctx.open_report(source, None).await?;
    let points = report.net_amount_cumsum();

    if json {
        println!("{}", serde_json::to_string_pretty(&points)?);
    } else {
        println!("{}", display_cumsum(&points));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::activity::fixtures::date;

    #[test]
    fn test_display_cumsum() {
        let rendered = display_cumsum(&[
            ChartPoint {
                x: date("2023-01-01"),
                y: 1000.0,
            },
            ChartPoint {
                x: date("2023-01-02"),
                y: 1500.0,
            },
        ]);
        assert!(rendered.contains("2023-01-02"));
        assert!(rendered.contains("1500.00"));
    }
}
