use std::{fs, path::Path, path::PathBuf};

use serde::Deserialize;

use crate::processor::ProcessorError;

/// Header names of the required input columns
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub order_id: String,
    pub time: String,
    pub city: String,
    pub customer_type: String,
    pub gender: String,
    pub product_line: String,
    pub total_price: String,
    pub rating: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        ColumnNames {
            order_id: "订单号".to_string(),
            time: "时间".to_string(),
            city: "城市".to_string(),
            customer_type: "顾客类型".to_string(),
            gender: "性别".to_string(),
            product_line: "产品类型".to_string(),
            total_price: "总价".to_string(),
            rating: "评分".to_string(),
        }
    }
}

/// Loader settings
///
/// Every field is optional in TOML:
///
/// ```toml
/// source = "data/supermarket_sales.xlsx"
/// sheet = "销售数据"
/// skip_rows = 1
///
/// [columns]
/// total_price = "Total"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Workbook (`.xlsx`, `.xls`, `.ods`, ...) or CSV file, chosen by extension
    pub source: PathBuf,
    /// Worksheet read from a workbook source; ignored for CSV
    pub sheet: String,
    /// Rows before the header line (the sheet title)
    pub skip_rows: usize,
    pub columns: ColumnNames,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            source: PathBuf::from("supermarket_sales.xlsx"),
            sheet: "销售数据".to_string(),
            skip_rows: 1,
            columns: ColumnNames::default(),
        }
    }
}

impl DashboardConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ProcessorError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ProcessorError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = source.into();
        self
    }
}
