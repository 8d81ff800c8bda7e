use rand::Rng;
use std::fs::{self, File};
use std::io::{BufWriter, Write};

const CITIES: [&str; 3] = ["上海", "北京", "广州"];
const CUSTOMER_TYPES: [&str; 2] = ["会员", "普通"];
const GENDERS: [&str; 2] = ["男", "女"];
const PRODUCT_LINES: [&str; 6] = ["电子产品", "服装", "食品", "家居用品", "运动户外", "美妆"];

fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "data/supermarket_sales.csv".to_string());
    let rows: usize = std::env::args()
        .nth(2)
        .map(|n| n.parse().expect("row count must be an integer"))
        .unwrap_or(1_000);

    if let Some(parent) = std::path::Path::new(&path).parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let file = File::create(&path).unwrap();
    let mut writer = BufWriter::new(file);

    writeln!(writer, "销售数据").unwrap();
    writeln!(writer, "订单号,时间,城市,顾客类型,性别,产品类型,总价,评分").unwrap();

    let mut rng = rand::rng();
    for i in 0..rows {
        let hour = rng.random_range(10..21);
        let minute = rng.random_range(0..60);
        let second = rng.random_range(0..60);
        let city = CITIES[rng.random_range(0..CITIES.len())];
        let customer = CUSTOMER_TYPES[rng.random_range(0..CUSTOMER_TYPES.len())];
        let gender = GENDERS[rng.random_range(0..GENDERS.len())];
        let product = PRODUCT_LINES[rng.random_range(0..PRODUCT_LINES.len())];
        let total: f64 = rng.random_range(10.0..1000.0);
        let rating: f64 = rng.random_range(4.0..10.0) / 2.0;
        writeln!(
            writer,
            "{},{:02}:{:02}:{:02},{},{},{},{},{:.2},{:.1}",
            100_000 + i,
            hour,
            minute,
            second,
            city,
            customer,
            gender,
            product,
            total,
            rating
        )
        .unwrap();
    }

    println!("Sample sales CSV generated: {} ({} rows)", path, rows);
}
