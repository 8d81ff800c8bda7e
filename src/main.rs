use std::path::PathBuf;

use clap::Parser;
use sales_dashboard::{Bucket, Dashboard, DashboardConfig, DashboardView};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sales-dashboard", about = "Sales dashboard figures from a transaction workbook or CSV")]
struct Cli {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Data file, overrides the config
    #[arg(long)]
    data: Option<PathBuf>,
    /// Worksheet to read from a workbook, overrides the config
    #[arg(long)]
    sheet: Option<String>,
    /// Rows before the header line, overrides the config
    #[arg(long)]
    skip_rows: Option<usize>,
    /// Keep only these cities (repeatable); all when omitted
    #[arg(long = "city")]
    cities: Vec<String>,
    /// Keep only these customer types (repeatable); all when omitted
    #[arg(long = "customer-type")]
    customer_types: Vec<String>,
    /// Keep only these genders (repeatable); all when omitted
    #[arg(long = "gender")]
    genders: Vec<String>,
    /// Print the view as JSON
    #[arg(long)]
    json: bool,
    #[arg(long, default_value = "info")]
    log: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => DashboardConfig::from_file(path)?,
        None => DashboardConfig::default(),
    };
    if let Some(data) = &cli.data {
        config.source = data.clone();
    }
    if let Some(sheet) = &cli.sheet {
        config.sheet = sheet.clone();
    }
    if let Some(n) = cli.skip_rows {
        config.skip_rows = n;
    }

    let (dashboard, warning) = Dashboard::load(&config)?;
    if let Some(w) = &warning {
        eprintln!("warning: {w}");
    }
    info!(rows = dashboard.table().len(), "dashboard ready");

    let mut query = dashboard.query();
    if !cli.cities.is_empty() {
        query = query.cities(cli.cities);
    }
    if !cli.customer_types.is_empty() {
        query = query.customer_types(cli.customer_types);
    }
    if !cli.genders.is_empty() {
        query = query.genders(cli.genders);
    }
    let view = query.execute()?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_report(&view);
    }
    Ok(())
}

fn print_report(view: &DashboardView) {
    let s = &view.summary;

    println!("销售仪表板 ({} orders)", view.row_count);
    println!("总销售额：RMB ¥ {}", thousands(s.total_sales));
    match s.average_rating {
        Some(r) => println!("顾客评分的平均值：{r:.1} {}", s.stars("⭐")),
        None => println!("顾客评分的平均值：-"),
    }
    match s.average_transaction {
        Some(t) => println!("每单的平均销售额：RMB ¥ {t:.2}"),
        None => println!("每单的平均销售额：-"),
    }

    println!();
    println!("按小时数划分的销售额");
    print_buckets(&view.sales_by_hour);
    println!();
    println!("按产品类型划分的销售额");
    print_buckets(&view.sales_by_product_line);
}

fn print_buckets<K: std::fmt::Display>(buckets: &[Bucket<K>]) {
    if buckets.is_empty() {
        println!("  (no data)");
    }
    for b in buckets {
        println!("  {:<12} {:>12.2}", b.key, b.total);
    }
}

/// 1234567 -> "1,234,567"
fn thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
