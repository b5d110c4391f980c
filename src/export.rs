use std::io;

use serde::Serialize;

use crate::{chart::ChartResult, model};

#[derive(Serialize)]
struct CloseRow<'a> {
    date: &'a str,
    close: f64,
}

/// Writes the chart's points as `date,close` rows.
pub fn write_chart_csv<W: io::Write>(writer: W, chart: &ChartResult) -> model::Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut rows = 0;
    for (date, close) in chart.closes() {
        wtr.serialize(CloseRow { date, close })?;
        rows += 1;
    }
    if rows == 0 {
        wtr.write_record(["date", "close"])?;
    }
    wtr.flush()?;
    Ok(rows)
}
