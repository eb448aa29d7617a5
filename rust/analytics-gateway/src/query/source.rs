//! Parquet table locations in the data lake.

use crate::error::{Result, ServiceError};

pub const VISITS_TABLE: &str = "visits_datamgr_format";
pub const AD_REPORT_TABLE: &str = "adreport_datamgr_format";
pub const TRANSACTIONS_TABLE: &str = "transactions_datamgr_format";

const MAX_TABLE_NAME_LEN: usize = 128;

/// Bucket and customer partition that every table path is rooted at.
#[derive(Debug, Clone)]
pub struct LakeConfig {
    pub bucket: String,
    pub customer_id: String,
}

impl LakeConfig {
    /// Glob over all parquet files of `table`, without the URI scheme.
    pub fn table_path(&self, table: &str) -> Result<String> {
        let table = validate_table_name(table)?;
        Ok(format!(
            "{}/main/cust_id={}/table_name={table}/**/*.parquet",
            self.bucket.trim_end_matches('/'),
            self.customer_id
        ))
    }

    /// `READ_PARQUET(...)` table function usable in a `FROM` clause.
    pub fn read_parquet(&self, table: &str) -> Result<String> {
        Ok(format!(
            "READ_PARQUET('{}', union_by_name=True)",
            self.table_path(table)?
        ))
    }

    /// Fully qualified S3 URI, as handed to the completion prompt.
    pub fn s3_uri(&self, table: &str) -> Result<String> {
        let path = self.table_path(table)?;
        if path.starts_with("s3://") {
            Ok(path)
        } else {
            Ok(format!("s3://{path}"))
        }
    }
}

/// Table names are spliced into paths and SQL, so only `[A-Za-z0-9_-]` is accepted.
pub fn validate_table_name(table: &str) -> Result<&str> {
    let table = table.trim();
    if table.is_empty() {
        return Err(ServiceError::InvalidRequest("tableName is required".into()));
    }
    if table.len() > MAX_TABLE_NAME_LEN {
        return Err(ServiceError::InvalidRequest(format!(
            "tableName exceeds {MAX_TABLE_NAME_LEN} characters"
        )));
    }
    if !table
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ServiceError::InvalidRequest(format!(
            "invalid tableName '{table}'"
        )));
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lake() -> LakeConfig {
        LakeConfig {
            bucket: "analytics-bucket/".into(),
            customer_id: "cust_123".into(),
        }
    }

    #[test]
    fn renders_read_parquet_source() {
        assert_eq!(
            lake().read_parquet("visits_datamgr_format").unwrap(),
            "READ_PARQUET('analytics-bucket/main/cust_id=cust_123/table_name=visits_datamgr_format/**/*.parquet', union_by_name=True)"
        );
    }

    #[test]
    fn s3_uri_adds_scheme_once() {
        assert_eq!(
            lake().s3_uri("orders").unwrap(),
            "s3://analytics-bucket/main/cust_id=cust_123/table_name=orders/**/*.parquet"
        );

        let prefixed = LakeConfig {
            bucket: "s3://analytics-bucket".into(),
            customer_id: "cust_123".into(),
        };
        assert!(prefixed.s3_uri("orders").unwrap().starts_with("s3://analytics-bucket/"));
    }

    #[test]
    fn rejects_unsafe_table_names() {
        for name in ["", "   ", "orders'; DROP TABLE x; --", "a/b", "../secrets"] {
            assert!(validate_table_name(name).is_err(), "{name:?} should be rejected");
        }
        assert_eq!(validate_table_name(" ad-report_2 ").unwrap(), "ad-report_2");
    }
}
