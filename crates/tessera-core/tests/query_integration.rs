//! Integration tests for the query engine.

use serde_json::json;
use tessera_core::{
    Database, EntityDef, ErrorCode, FieldDef, FilterOp, FilterSpec, ListQuery, NullsOrder, Payload,
    ScalarType, SchemaBundle, SortKey, StoreConfig, Value,
};

fn payload(value: serde_json::Value) -> Payload {
    value.as_object().cloned().unwrap()
}

fn setup_ledger_schema() -> SchemaBundle {
    SchemaBundle::new(1)
        .with_entity(
            EntityDef::new("crm", "Customer")
                .with_field(FieldDef::scalar("name", ScalarType::String))
                .with_field(FieldDef::scalar("email", ScalarType::String)),
        )
        .with_entity(
            EntityDef::new("billing", "Entry")
                .with_field(FieldDef::scalar("label", ScalarType::String))
                .with_field(FieldDef::scalar("amount", ScalarType::Int))
                .with_field(FieldDef::scalar("rate", ScalarType::Float))
                .with_field(FieldDef::scalar("booked", ScalarType::Date))
                .with_field(FieldDef::scalar("settled", ScalarType::Bool))
                .with_field(FieldDef::enumeration("status", ["Draft", "Booked", "Void"]))
                .with_field(FieldDef::array_ref("customers", "crm.Customer")),
        )
}

struct TestContext {
    db: Database,
}

impl TestContext {
    fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    fn with_config(config: StoreConfig) -> Self {
        Self {
            db: Database::with_config(setup_ledger_schema(), config).unwrap(),
        }
    }

    fn entry(&self, data: serde_json::Value) -> String {
        self.db.create("Entry", payload(data)).unwrap().id
    }

    fn list(&self, params: &[(&str, &str)]) -> Vec<String> {
        let query = ListQuery::from_params(params.iter().copied()).unwrap();
        self.db
            .list("Entry", &query)
            .unwrap()
            .records
            .into_iter()
            .map(|r| match r.get("label") {
                Some(Value::String(label)) => label.clone(),
                _ => String::new(),
            })
            .collect()
    }
}

fn setup_entries(ctx: &TestContext) {
    ctx.entry(json!({"label": "a", "amount": 10, "rate": 0.5, "booked": "2024-01-10", "status": "Draft"}));
    ctx.entry(json!({"label": "b", "amount": 50, "rate": 1.5, "booked": "2024-02-10", "status": "Booked", "settled": true}));
    ctx.entry(json!({"label": "c", "amount": 100, "booked": "2024-03-10", "status": "Booked", "settled": false}));
    ctx.entry(json!({"label": "d", "status": "Void"}));
}

#[test]
fn test_gte_filter() {
    let ctx = TestContext::new();
    setup_entries(&ctx);

    let mut found = ctx.list(&[("amount__gte", "50")]);
    found.sort();
    assert_eq!(found, vec!["b", "c"]);
}

#[test]
fn test_ordering_operators() {
    let ctx = TestContext::new();
    setup_entries(&ctx);

    assert_eq!(ctx.list(&[("amount__gt", "50"), ("sort", "label")]), vec!["c"]);
    assert_eq!(ctx.list(&[("amount__lt", "50"), ("sort", "label")]), vec!["a"]);
    assert_eq!(ctx.list(&[("amount__lte", "50"), ("sort", "label")]), vec!["a", "b"]);
    assert_eq!(ctx.list(&[("rate__gt", "1"), ("sort", "label")]), vec!["b"]);
    assert_eq!(
        ctx.list(&[("booked__gte", "2024-02-01"), ("booked__lt", "2024-03-31"), ("sort", "label")]),
        vec!["b", "c"]
    );
    // Non-numeric operands match nothing.
    assert!(ctx.list(&[("amount__gte", "lots")]).is_empty());
}

#[test]
fn test_equality_and_membership() {
    let ctx = TestContext::new();
    setup_entries(&ctx);

    assert_eq!(ctx.list(&[("status", "Booked"), ("sort", "label")]), vec!["b", "c"]);
    assert_eq!(ctx.list(&[("status", "in:Draft,Void"), ("sort", "label")]), vec!["a", "d"]);
    assert_eq!(ctx.list(&[("status__in", "Void, Draft"), ("sort", "label")]), vec!["a", "d"]);
    assert_eq!(ctx.list(&[("settled", "yes")]), vec!["b"]);
    assert_eq!(ctx.list(&[("amount", "100")]), vec!["c"]);
}

#[test]
fn test_array_membership_filter() {
    let ctx = TestContext::new();
    let ann = ctx
        .db
        .create("Customer", payload(json!({"name": "Ann"})))
        .unwrap()
        .id;
    let bob = ctx
        .db
        .create("Customer", payload(json!({"name": "Bob"})))
        .unwrap()
        .id;
    ctx.entry(json!({"label": "shared", "customers": [ann, bob]}));
    ctx.entry(json!({"label": "solo", "customers": [bob]}));

    assert_eq!(ctx.list(&[("customers", ann.as_str())]), vec!["shared"]);
    assert_eq!(ctx.list(&[("customers", bob.as_str()), ("sort", "label")]), vec!["shared", "solo"]);
    // Arrays never satisfy ordering operators.
    assert!(ctx.list(&[("customers__gte", "0")]).is_empty());
}

#[test]
fn test_text_search() {
    let ctx = TestContext::new();
    ctx.entry(json!({"label": "Office Rent", "amount": 1200}));
    ctx.entry(json!({"label": "Coffee", "amount": 12}));
    ctx.entry(json!({"label": "Printer", "amount": 300}));

    let mut found = ctx.list(&[("q", "OFF")]);
    found.sort();
    assert_eq!(found, vec!["Coffee", "Office Rent"]);
    assert_eq!(ctx.list(&[("q", "off"), ("amount__lt", "100")]), vec!["Coffee"]);
}

#[test]
fn test_sort_desc_nulls_last() {
    let ctx = TestContext::new();
    ctx.entry(json!({"label": "low", "amount": 20}));
    ctx.entry(json!({"label": "none"}));
    ctx.entry(json!({"label": "high", "amount": 70}));
    ctx.entry(json!({"label": "mid", "amount": 35}));
    ctx.entry(json!({"label": "null", "amount": null}));

    let found = ctx.list(&[("sort", "-amount"), ("nulls", "last")]);
    assert_eq!(&found[..3], ["high", "mid", "low"]);
    let mut tail = found[3..].to_vec();
    tail.sort();
    assert_eq!(tail, vec!["none", "null"]);

    let found = ctx.list(&[("sort", "amount"), ("nulls", "last")]);
    assert_eq!(&found[..3], ["low", "mid", "high"]);

    let found = ctx.list(&[("sort", "amount"), ("nulls", "first")]);
    assert_eq!(&found[2..], ["low", "mid", "high"]);
}

#[test]
fn test_order_param_and_multi_key_sort() {
    let ctx = TestContext::new();
    ctx.entry(json!({"label": "a", "status": "Draft", "amount": 20}));
    ctx.entry(json!({"label": "b", "status": "Booked", "amount": 30}));
    ctx.entry(json!({"label": "c", "status": "Draft", "amount": 40}));

    assert_eq!(ctx.list(&[("sort", "status,-amount")]), vec!["b", "c", "a"]);
    assert_eq!(ctx.list(&[("sort", "label"), ("order", "desc")]), vec!["c", "b", "a"]);

    let query = ListQuery::new()
        .with_sort(SortKey::desc("status"))
        .with_sort(SortKey::asc("amount"));
    let labels: Vec<Value> = ctx
        .db
        .list("Entry", &query)
        .unwrap()
        .records
        .into_iter()
        .filter_map(|r| r.get("label").cloned())
        .collect();
    assert_eq!(
        labels,
        vec![Value::from("a"), Value::from("c"), Value::from("b")]
    );
}

#[test]
fn test_pagination_reports_filtered_total() {
    let ctx = TestContext::with_config(StoreConfig::default().with_default_limit(2).with_max_limit(3));
    for i in 0..7 {
        ctx.entry(json!({"label": format!("e{}", i), "amount": i}));
    }

    let query = ListQuery::from_params([("sort", "label")]).unwrap();
    let page = ctx.db.list("Entry", &query).unwrap();
    assert_eq!(page.total, 7);
    assert_eq!(page.records.len(), 2);

    let query = ListQuery::from_params([("sort", "label"), ("offset", "5"), ("limit", "100")]).unwrap();
    let page = ctx.db.list("Entry", &query).unwrap();
    assert_eq!(page.total, 7);
    assert_eq!(page.records.len(), 2);

    let query = ListQuery::from_params([("sort", "label"), ("limit", "100")]).unwrap();
    assert_eq!(ctx.db.list("Entry", &query).unwrap().records.len(), 3);

    let query = ListQuery::from_params([("amount__gte", "3"), ("offset", "10")]).unwrap();
    let page = ctx.db.list("Entry", &query).unwrap();
    assert_eq!(page.total, 4);
    assert!(page.records.is_empty());
}

#[test]
fn test_default_order_is_creation_order() {
    let ctx = TestContext::new();
    for label in ["x", "y", "z"] {
        ctx.entry(json!({"label": label}));
    }
    assert_eq!(ctx.list(&[]), vec!["x", "y", "z"]);
}

#[test]
fn test_deleted_records_are_hidden() {
    let ctx = TestContext::new();
    let gone = ctx.entry(json!({"label": "gone", "amount": 1}));
    ctx.entry(json!({"label": "kept", "amount": 1}));
    ctx.db.soft_delete("Entry", &gone, None).unwrap();

    assert_eq!(ctx.list(&[("amount", "1")]), vec!["kept"]);
    let filter = FilterSpec::new().with("amount", FilterOp::Eq, "1");
    assert_eq!(ctx.db.count("Entry", &filter).unwrap(), 1);
}

#[test]
fn test_invalid_queries() {
    let cases: &[&[(&str, &str)]] = &[
        &[("amount__near", "5")],
        &[("limit", "-1")],
        &[("offset", "many")],
        &[("nulls", "middle")],
        &[("order", "sideways")],
    ];
    for params in cases {
        let err = ListQuery::from_params(params.iter().copied()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidQuery, "params {:?}", params);
    }
    assert_eq!("first".parse::<NullsOrder>().unwrap(), NullsOrder::First);
}

#[test]
fn test_lookup() {
    let ctx = TestContext::new();
    for (name, email) in [("Ann Lee", "ann@x.io"), ("Bob Stone", "bob@x.io"), ("Annika", "nika@x.io")] {
        ctx.db
            .create("Customer", payload(json!({"name": name, "email": email})))
            .unwrap();
    }

    let found = ctx.db.lookup("Customer", None, "ann", None).unwrap();
    let labels: Vec<&str> = found.iter().map(|i| i.label.as_str()).collect();
    assert_eq!(labels, vec!["Ann Lee", "Annika"]);

    let found = ctx.db.lookup("Customer", Some("email"), "BOB", None).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].label, "bob@x.io");

    assert_eq!(ctx.db.lookup("Customer", None, "", Some(1)).unwrap().len(), 1);
}
