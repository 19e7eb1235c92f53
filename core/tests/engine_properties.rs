use pretty_assertions::assert_eq;
use sales_core::{Evaluation, QueryEngine, RecordStore, SalesField, SalesRecord};
use std::collections::{BTreeSet, HashSet};
use std::io::Write;

// Values are multiples of 0.25 so every partial sum is exact in f64.
const DATA: &str = "\
Row ID,Order ID,Order Date,Ship Date,Ship Mode,Customer ID,Customer Name,Segment,Country,City,State,Postal Code,Region,Retail Sales People,Product ID,Category,Sub-Category,Product Name,Returned,Sales,Quantity,Discount,Profit
1,CA-2016-152156,08/11/2016,11/11/2016,Second Class,CG-12520,Claire Gute,Consumer,United States,Henderson,Kentucky,42420,South,Cassandra Brandow,FUR-BO-10001798,Furniture,Bookcases,Bush Somerset Collection Bookcase,Not,261.75,2,0,41.5
2,CA-2016-152156,08/11/2016,11/11/2016,Second Class,CG-12520,Claire Gute,Consumer,United States,Henderson,Kentucky,42420,South,Cassandra Brandow,FUR-CH-10000454,Furniture,Chairs,Hon Deluxe Fabric Chair,Not,731.75,3,0,219.5
3,CA-2016-138688,12/06/2016,16/06/2016,Second Class,DV-13045,Darrin Van Huff,Corporate,United States,Los Angeles,California,90036,West,Anna Andreadi,OFF-LA-10000240,Office Supplies,Labels,Self-Adhesive Address Labels,Not,14.5,2,0,6.75
4,US-2015-108966,11/10/2015,18/10/2015,Standard Class,SO-20335,Sean O'Donnell,Consumer,United States,Fort Lauderdale,Florida,33311,South,Cassandra Brandow,FUR-TA-10000577,Furniture,Tables,Bretford Table,Yes,957.5,5,0.45,-383
5,US-2015-108966,11/10/2015,18/10/2015,Standard Class,SO-20335,Sean O'Donnell,Consumer,United States,Fort Lauderdale,Florida,33311,South,Cassandra Brandow,OFF-ST-10000760,Office Supplies,Storage,Eldon Fold N Roll Cart,Not,22.25,2,0.2,2.5
6,CA-2014-115812,09/06/2014,14/06/2014,Standard Class,BH-11710,Brosina Hoffman,Consumer,United States,Los Angeles,California,90032,West,Anna Andreadi,FUR-FU-10001487,Furniture,Furnishings,Eldon Desk Accessories,Not,48.75,7,0,14.25
7,CA-2014-115812,09/06/2014,14/06/2014,Standard Class,BH-11710,Brosina Hoffman,Consumer,United States,Los Angeles,California,90032,West,Anna Andreadi,OFF-AR-10002833,Office Supplies,Art,Newell 322,Not,7.25,4,0,2
8,CA-2014-115812,09/06/2014,14/06/2014,Standard Class,BH-11710,Brosina Hoffman,Consumer,United States,Los Angeles,California,90032,,Anna Andreadi,TEC-PH-10002275,Technology,Phones,Mitel 5320 IP Phone,Not,907.25,6,0.2,90.75
9,CA-2014-115812,09/06/2014,14/06/2014,Standard Class,BH-11710,Brosina Hoffman,Consumer,United States,Los Angeles,California,90032,West,Anna Andreadi,OFF-LA-10000240,Office Supplies,Labels,Self-Adhesive Address Labels,Not,18.5,3,0.2,5.75
10,,,,,,,,,,,,,,,,,,,,,,
";

const GROUPING_FIELDS: [&str; 6] = [
    "region",
    "category",
    "customer_id",
    "state",
    "segment",
    "returned",
];

fn engine() -> QueryEngine {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(DATA.as_bytes()).unwrap();
    file.flush().unwrap();

    let engine = QueryEngine::new();
    engine.load(file.path()).unwrap();
    engine
}

fn total_sales(engine: &QueryEngine) -> f64 {
    engine.store().unwrap().all().iter().map(|r| r.sales).sum()
}

fn sum(engine: &QueryEngine, expression: &str) -> f64 {
    match engine.evaluate(expression).unwrap() {
        Evaluation::Sum(total) => total,
        other => panic!("Expected a sum for {}, got {:?}", expression, other),
    }
}

#[test]
fn test_ingestion_drops_sparse_rows_and_normalizes() {
    let engine = engine();
    let store = engine.store().unwrap();
    assert_eq!(store.len(), 9);

    let first = &store.all()[0];
    assert_eq!(first.order_date, "2016-11-08");
    assert_eq!(first.sales_rep, "Cassandra Brandow");
    assert_eq!(first.sub_category, "Bookcases");
}

#[test]
fn test_ingestion_order_is_preserved() {
    let engine = engine();
    let ids: Vec<i64> = engine
        .store()
        .unwrap()
        .all()
        .iter()
        .map(|r| r.row_id)
        .collect();
    assert_eq!(ids, (1..=9).collect::<Vec<_>>());
}

#[test]
fn test_partition_property() {
    let engine = engine();
    let store = engine.store().unwrap();

    for field_name in GROUPING_FIELDS {
        let field = SalesField::resolve(field_name).unwrap();
        let values: BTreeSet<String> = store
            .all()
            .iter()
            .map(|r| r.text(field).into_owned())
            .collect();

        let mut seen = HashSet::new();
        let mut total = 0;
        for value in &values {
            for record in engine.records_by_field(field_name, value).unwrap() {
                assert!(seen.insert(record.row_id), "row {} seen twice", record.row_id);
                total += 1;
            }
        }
        assert_eq!(total, store.len(), "partition by {}", field_name);
    }
}

#[test]
fn test_group_sums_match_grand_total() {
    let engine = engine();
    let grand_total = total_sales(&engine);

    for field in GROUPING_FIELDS {
        let groups = engine.stats_by(field).unwrap();
        let group_total: f64 = groups.values().map(|g| g.sum_sales).sum();
        let count: u64 = groups.values().map(|g| g.count).sum();
        assert_eq!(group_total, grand_total, "grouping by {}", field);
        assert_eq!(count, 9);
    }
}

#[test]
fn test_empty_group_key_is_kept() {
    let engine = engine();
    let groups = engine.stats_by("Region").unwrap();
    assert_eq!(groups[""].count, 1);
    assert_eq!(groups[""].sum_sales, 907.25);
}

#[test]
fn test_aggregate_consistency() {
    let engine = engine();
    let whole = sum(&engine, "sum(sales)");
    assert_eq!(whole, total_sales(&engine));

    let complements = [
        ("region = 'South'", "region != 'South'"),
        ("returned = 'Not'", "returned != 'Not'"),
        ("category = 'Furniture'", "category != 'Furniture'"),
    ];
    for (predicate, negated) in complements {
        let matched = sum(&engine, &format!("sum(sales[{}])", predicate));
        let rest = sum(&engine, &format!("sum(sales[{}])", negated));
        assert_eq!(matched + rest, whole, "{} / {}", predicate, negated);
    }
}

#[test]
fn test_numeric_range_and_prefix_filters() {
    let engine = engine();

    let ids = |expression: &str| -> Vec<i64> {
        engine
            .evaluate(expression)
            .unwrap()
            .records()
            .unwrap()
            .iter()
            .map(|r| r.row_id)
            .collect()
    };

    assert_eq!(ids("sales > 900"), vec![4, 8]);
    assert_eq!(ids("profit < 0"), vec![4]);
    assert_eq!(ids("order_date starts-with '2014-06'"), vec![6, 7, 8, 9]);
    assert_eq!(
        ids("region = 'West' and category = 'Office Supplies' and sales > 10"),
        vec![3, 9]
    );
    assert_eq!(
        engine.evaluate("count([returned != 'Not'])").unwrap(),
        Evaluation::Count(1)
    );
}

#[test]
fn test_top_products_merges_and_orders() {
    let engine = engine();
    let top = engine.top_products(3).unwrap();

    let names: Vec<&str> = top.iter().map(|p| p.product_name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Bretford Table", "Mitel 5320 IP Phone", "Hon Deluxe Fabric Chair"]
    );

    let labels = engine
        .top_products(100)
        .unwrap()
        .into_iter()
        .find(|p| p.product_name == "Self-Adhesive Address Labels")
        .unwrap();
    assert_eq!(labels.total_sales, 33.0);
    assert_eq!(engine.top_products(100).unwrap().len(), 8);
}

#[test]
fn test_sales_by_state_covers_store() {
    let engine = engine();
    let states = engine.sales_by_state().unwrap();

    let names: BTreeSet<&str> = states.iter().map(|s| s.state.as_str()).collect();
    assert_eq!(names, BTreeSet::from(["California", "Florida", "Kentucky"]));
    assert_eq!(states.iter().map(|s| s.count).sum::<u64>(), 9);
}

#[test]
fn test_reads_are_idempotent() {
    let engine = engine();

    assert_eq!(engine.stats_by("state").unwrap(), engine.stats_by("state").unwrap());
    assert_eq!(engine.top_products(5).unwrap(), engine.top_products(5).unwrap());
    assert_eq!(
        engine.evaluate("sales > 20").unwrap(),
        engine.evaluate("sales > 20").unwrap()
    );
    assert_eq!(
        engine.records_by_field("state", "Florida").unwrap(),
        engine.records_by_field("state", "Florida").unwrap()
    );
}

#[test]
fn test_documented_example_store() {
    let store = RecordStore::from_records(vec![
        SalesRecord {
            row_id: 1,
            region: "South".to_string(),
            sales: 100.0,
            profit: 10.0,
            ..Default::default()
        },
        SalesRecord {
            row_id: 2,
            region: "South".to_string(),
            sales: 50.0,
            profit: -5.0,
            ..Default::default()
        },
        SalesRecord {
            row_id: 3,
            region: "West".to_string(),
            sales: 200.0,
            profit: 20.0,
            ..Default::default()
        },
    ])
    .unwrap();
    let engine = QueryEngine::from_store(store);

    let stats = engine.stats_by("region").unwrap();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats["South"].sum_sales, 150.0);
    assert_eq!(stats["South"].sum_profit, 5.0);
    assert_eq!(stats["South"].count, 2);
    assert_eq!(stats["West"].sum_sales, 200.0);
    assert_eq!(stats["West"].count, 1);

    let matches: Vec<i64> = engine
        .evaluate("sales > 75")
        .unwrap()
        .records()
        .unwrap()
        .iter()
        .map(|r| r.row_id)
        .collect();
    assert_eq!(matches, vec![1, 3]);

    assert_eq!(
        engine.evaluate("sum(sales[region='South'])").unwrap(),
        Evaluation::Sum(150.0)
    );
    assert!(engine.records_by_field("region", "North").unwrap().is_empty());
}

#[test]
fn test_concurrent_readers_share_one_engine() {
    let engine = std::sync::Arc::new(engine());
    let expected = engine.stats_by("category").unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = std::sync::Arc::clone(&engine);
            std::thread::spawn(move || engine.stats_by("category").unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}
