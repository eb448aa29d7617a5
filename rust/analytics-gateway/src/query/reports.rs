//! Fixed analytical reports over the visits, ad report and transactions tables.

use super::source::{LakeConfig, AD_REPORT_TABLE, TRANSACTIONS_TABLE, VISITS_TABLE};
use crate::{
    error::{Result, ServiceError},
    time::DateRange,
};

const REPORT_DATE: &str = "(date_time->>'date')::date";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    UniqueCounts,
    SessionsByMonth,
    SessionsByDay,
    AdStatsByTime,
    ImpressionStatsByTime,
    TotalRoas,
    CpcRate,
    DonutChart,
    PieChart,
}

/// How a report's rows are wrapped in the response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    /// Rows are returned directly as `data`.
    Raw,
    /// `data: {"type": label, "data": rows}` with an empty `chart`.
    Typed(&'static str),
    /// Empty `data` with `chart: {"chartType": kind, "data": rows}`.
    Chart(&'static str),
}

impl Report {
    pub const ALL: [Report; 9] = [
        Report::UniqueCounts,
        Report::SessionsByMonth,
        Report::SessionsByDay,
        Report::AdStatsByTime,
        Report::ImpressionStatsByTime,
        Report::TotalRoas,
        Report::CpcRate,
        Report::DonutChart,
        Report::PieChart,
    ];

    pub fn from_type(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|report| report.type_name() == raw.trim())
    }

    /// Value of the `type` query parameter selecting this report.
    pub fn type_name(&self) -> &'static str {
        match self {
            Report::UniqueCounts => "unique-counts",
            Report::SessionsByMonth => "session-broken-down-by-month",
            Report::SessionsByDay => "session-broken-down-by-day",
            Report::AdStatsByTime => "ad-stats-by-time",
            Report::ImpressionStatsByTime => "impression-stats-by-time",
            Report::TotalRoas => "total-RAO",
            Report::CpcRate => "cpc-rate",
            Report::DonutChart => "donut-chart",
            Report::PieChart => "pie-chart",
        }
    }

    pub fn requires_dates(&self) -> bool {
        matches!(
            self,
            Report::AdStatsByTime
                | Report::ImpressionStatsByTime
                | Report::TotalRoas
                | Report::CpcRate
                | Report::PieChart
        )
    }

    pub fn presentation(&self) -> Presentation {
        match self {
            Report::UniqueCounts => Presentation::Raw,
            Report::SessionsByMonth => Presentation::Typed("sessionBrokenDownByMonth"),
            Report::SessionsByDay => Presentation::Typed("sessionBrokenDownByDay"),
            Report::AdStatsByTime => Presentation::Typed("adStats"),
            Report::ImpressionStatsByTime => Presentation::Typed("impression"),
            Report::TotalRoas => Presentation::Typed("RAO"),
            Report::CpcRate => Presentation::Typed("CPC"),
            Report::DonutChart => Presentation::Chart("donut"),
            Report::PieChart => Presentation::Chart("pie"),
        }
    }

    /// Builds the report SQL. `table` overrides the ad report table for
    /// impression stats and is ignored elsewhere.
    pub fn sql(
        &self,
        lake: &LakeConfig,
        range: Option<&DateRange>,
        table: Option<&str>,
    ) -> Result<String> {
        let sql = match self {
            Report::UniqueCounts => format!(
                "SELECT COUNT(DISTINCT _data->>'sid') AS unique_sessions FROM {}",
                lake.read_parquet(VISITS_TABLE)?
            ),
            Report::SessionsByMonth => format!(
                "SELECT _data->>'sessionSource' AS session_source, _data->>'yearMonth' AS year_month, \
                 COUNT(DISTINCT _data->>'sid') AS unique_sessions FROM {} \
                 GROUP BY session_source, year_month ORDER BY session_source, year_month",
                lake.read_parquet(VISITS_TABLE)?
            ),
            Report::SessionsByDay => format!(
                "SELECT _data->>'sessionSource' AS session_source, _data->>'date' AS date, \
                 COUNT(DISTINCT _data->>'sid') AS unique_sessions FROM {} \
                 GROUP BY session_source, date ORDER BY session_source, date",
                lake.read_parquet(VISITS_TABLE)?
            ),
            Report::AdStatsByTime => format!(
                "SELECT source->>'dataSource' AS ad_source, \
                 SUM(CAST(metrics->>'cost' AS DOUBLE)) AS total_spend FROM {} \
                 WHERE (source->>'dataSource' IN ('google', 'meta', 'linkedin')) AND {} \
                 GROUP BY ad_source ORDER BY ad_source",
                lake.read_parquet(AD_REPORT_TABLE)?,
                dates(self, range)?.between(REPORT_DATE)
            ),
            Report::ImpressionStatsByTime => format!(
                "SELECT SUM(CAST(metrics->>'impressions' AS BIGINT)) AS total FROM {} WHERE {}",
                lake.read_parquet(table.unwrap_or(AD_REPORT_TABLE))?,
                dates(self, range)?.between(REPORT_DATE)
            ),
            Report::TotalRoas => format!(
                "WITH revenue_sum AS (SELECT SUM(CAST(_data->>'total' AS DOUBLE)) AS total_revenue FROM {}), \
                 adspend_sum AS (SELECT SUM(CAST(metrics->>'cost' AS DOUBLE)) AS total_adspend FROM {} WHERE {}) \
                 SELECT revenue_sum.total_revenue / adspend_sum.total_adspend AS total_roas \
                 FROM revenue_sum, adspend_sum",
                lake.read_parquet(TRANSACTIONS_TABLE)?,
                lake.read_parquet(AD_REPORT_TABLE)?,
                dates(self, range)?.between(REPORT_DATE)
            ),
            Report::CpcRate => {
                let ads = lake.read_parquet(AD_REPORT_TABLE)?;
                let window = dates(self, range)?.between(REPORT_DATE);
                format!(
                    "WITH clicks_sum AS (SELECT SUM(CAST(metrics->>'clicks' AS INTEGER)) AS total_clicks FROM {ads} WHERE {window}), \
                     impressions_sum AS (SELECT SUM(CAST(metrics->>'impressions' AS INTEGER)) AS total_impressions FROM {ads} WHERE {window}) \
                     SELECT clicks_sum.total_clicks / impressions_sum.total_impressions AS cpc_rate \
                     FROM clicks_sum, impressions_sum"
                )
            }
            Report::DonutChart => {
                let transactions = lake.read_parquet(TRANSACTIONS_TABLE)?;
                format!(
                    "WITH total_revenue_cte AS (SELECT SUM(CAST(_data->>'total' AS DECIMAL)) AS total_revenue FROM {transactions}), \
                     revenue_by_source AS (SELECT TRIM(BOTH '\"' FROM JSON_EXTRACT(_data, '$.campaign.source')) AS source, \
                     SUM(CAST(_data->>'total' AS DECIMAL)) AS revenue FROM {transactions} \
                     WHERE JSON_EXTRACT(_data, '$.campaign.source') IS NOT NULL GROUP BY source) \
                     SELECT r.source, r.revenue, t.total_revenue \
                     FROM revenue_by_source r CROSS JOIN total_revenue_cte t"
                )
            }
            Report::PieChart => format!(
                "SELECT (source->>'dataSource') AS source, \
                 SUM(CAST(metrics->>'cost' AS DECIMAL)) AS total_ad_spend FROM {} \
                 WHERE {} GROUP BY source",
                lake.read_parquet(AD_REPORT_TABLE)?,
                dates(self, range)?.between(REPORT_DATE)
            ),
        };
        Ok(sql)
    }
}

fn dates<'a>(report: &Report, range: Option<&'a DateRange>) -> Result<&'a DateRange> {
    range.ok_or_else(|| {
        ServiceError::InvalidRequest(format!(
            "report '{}' requires startDate and endDate",
            report.type_name()
        ))
    })
}
