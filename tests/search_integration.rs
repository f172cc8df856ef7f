use chrono::{TimeZone, Utc};

use showdex::{
    Cardinality, DocAddress, Document, FacetOptions, Facet, Index, JsonOptions, NumericOptions,
    OrderKey, Query, Schema, SearchRequest, ShowdexError, Term, TextIndexing, TextOptions, Value,
};

fn create_schema() -> Schema {
    let mut builder = Schema::builder();
    builder
        .add_text_field("title", TextOptions::text().with_stored())
        .unwrap();
    builder
        .add_i64_field("year", NumericOptions::default().with_indexed().with_stored())
        .unwrap();
    builder
        .add_date_field("aired", NumericOptions::default().with_indexed().with_stored())
        .unwrap();
    builder
        .add_u64_field(
            "views",
            NumericOptions::default()
                .with_stored()
                .with_fast(Cardinality::Single),
        )
        .unwrap();
    builder
        .add_facet_field(
            "category",
            FacetOptions::default()
                .with_stored()
                .with_fast(Cardinality::Multi),
        )
        .unwrap();
    builder
        .add_json_field(
            "attrs",
            JsonOptions::default()
                .with_stored()
                .with_indexing(TextIndexing::default()),
        )
        .unwrap();
    builder.build()
}

fn fruit_index() -> Index {
    let index = Index::create(create_schema(), None, false).unwrap();
    let mut writer = index.writer(1 << 20, 1).unwrap();
    let docs = [
        r#"{"title": "red apple", "year": 1999, "aired": "2024-01-10", "views": 10, "category": "/fruit/apple", "attrs": {"color": "red"}}"#,
        r#"{"title": "green apple", "year": 2005, "aired": "2024-02-10", "views": 30, "category": "/fruit/apple", "attrs": {"color": "green"}}"#,
        r#"{"title": "red banana", "year": 2010, "aired": "2024-03-10", "views": 10, "category": "/fruit/banana"}"#,
        r#"{"title": "red car", "year": -20, "category": "/vehicle/car", "attrs": {"color": "red"}}"#,
    ];
    for doc in docs {
        writer.add_json(doc).unwrap();
    }
    writer.commit().unwrap();
    index
}

fn titles(index: &Index, hits: &[DocAddress]) -> Vec<String> {
    let searcher = index.searcher();
    hits.iter()
        .map(|addr| {
            searcher
                .doc(*addr)
                .unwrap()
                .get_first("title")
                .and_then(Value::as_str)
                .unwrap()
                .to_string()
        })
        .collect()
}

fn sorted_titles(index: &Index, text: &str) -> Vec<String> {
    let query = index.parse_query(text, &["title"]).unwrap();
    let result = index.searcher().search(&query, 10, true, None, 0).unwrap();
    let mut out = titles(index, &result.addresses());
    out.sort();
    out
}

#[test]
fn red_apple_scenario() {
    let index = Index::create(create_schema(), None, false).unwrap();
    let mut writer = index.writer(1 << 20, 1).unwrap();
    for title in ["red apple", "green apple", "red banana"] {
        let mut doc = Document::new();
        doc.add_text("title", title);
        writer.add_document(doc).unwrap();
    }
    writer.commit().unwrap();
    index.reload().unwrap();
    let searcher = index.searcher();

    let apple = index.parse_query("title:apple", &["title"]).unwrap();
    let result = searcher.search(&apple, 10, true, None, 0).unwrap();
    assert_eq!(result.len(), 2);
    assert_eq!(result.count, Some(2));

    let red = index.parse_query("title:red", &["title"]).unwrap();
    let result = searcher.search(&red, 10, true, None, 0).unwrap();
    let mut found = titles(&index, &result.addresses());
    found.sort();
    assert_eq!(found, vec!["red apple", "red banana"]);
}

#[test]
fn offset_returns_second_ranked_hit() {
    let index = fruit_index();
    let searcher = index.searcher();
    let query = index.parse_query("red", &["title"]).unwrap();

    let all = searcher.search(&query, 10, true, None, 0).unwrap();
    assert_eq!(all.len(), 3);

    let page = searcher.search(&query, 1, false, None, 1).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page.count, None);
    assert_eq!(page.hits[0].1, all.hits[1].1);
}

#[test]
fn boolean_operators() {
    let index = fruit_index();
    assert_eq!(sorted_titles(&index, "red AND apple"), vec!["red apple"]);
    assert_eq!(
        sorted_titles(&index, "red -apple"),
        vec!["red banana", "red car"]
    );
    assert_eq!(
        sorted_titles(&index, "banana OR green"),
        vec!["green apple", "red banana"]
    );
    assert_eq!(sorted_titles(&index, "\"red apple\""), vec!["red apple"]);
    assert_eq!(sorted_titles(&index, "*").len(), 4);
}

#[test]
fn facet_subtree_queries() {
    let index = fruit_index();
    assert_eq!(
        sorted_titles(&index, "category:/fruit"),
        vec!["green apple", "red apple", "red banana"]
    );
    assert_eq!(
        sorted_titles(&index, "category:/fruit/apple"),
        vec!["green apple", "red apple"]
    );
    assert!(sorted_titles(&index, "category:/fruits").is_empty());

    let field = index.schema().get_field("category").unwrap();
    let query = Query::facet(field, Facet::from_string("/vehicle").unwrap());
    let result = index.searcher().search(&query, 10, true, None, 0).unwrap();
    assert_eq!(result.count, Some(1));
}

#[test]
fn facet_counts_per_child() {
    let index = fruit_index();
    let searcher = index.searcher();

    let counts = searcher
        .facet_counts(&Query::all(), "category", &Facet::root())
        .unwrap();
    assert_eq!(
        counts,
        vec![
            (Facet::from_string("/fruit").unwrap(), 3),
            (Facet::from_string("/vehicle").unwrap(), 1),
        ]
    );

    let red = index.parse_query("title:red", &["title"]).unwrap();
    let counts = searcher
        .facet_counts(&red, "category", &Facet::from_string("/fruit").unwrap())
        .unwrap();
    assert_eq!(
        counts,
        vec![
            (Facet::from_string("/fruit/apple").unwrap(), 1),
            (Facet::from_string("/fruit/banana").unwrap(), 1),
        ]
    );

    assert!(matches!(
        searcher.facet_counts(&red, "title", &Facet::root()),
        Err(ShowdexError::InvalidArgument(_))
    ));
}

#[test]
fn i64_and_date_ranges() {
    let index = fruit_index();
    assert_eq!(
        sorted_titles(&index, "year:[2000 TO 2010]"),
        vec!["green apple", "red banana"]
    );
    assert_eq!(
        sorted_titles(&index, "year:{2000 TO 2010}"),
        vec!["green apple"]
    );
    assert_eq!(sorted_titles(&index, "year:[* TO 0]"), vec!["red car"]);
    assert_eq!(sorted_titles(&index, "year:-20"), vec!["red car"]);
    assert_eq!(
        sorted_titles(&index, "aired:[2024-02-01 TO *]"),
        vec!["green apple", "red banana"]
    );
    assert_eq!(
        sorted_titles(&index, "aired:[2024-01-01 TO 2024-02-10T00:00:00Z}"),
        vec!["red apple"]
    );
}

#[test]
fn json_path_queries() {
    let index = fruit_index();
    assert_eq!(
        sorted_titles(&index, "attrs.color:red"),
        vec!["red apple", "red car"]
    );
}

#[test]
fn order_by_fast_field_with_tie_break() {
    let index = fruit_index();
    let searcher = index.searcher();
    let request = SearchRequest::new(Query::all()).with_order_by("views");
    let result = searcher.execute(&request).unwrap();

    let keys: Vec<OrderKey> = result.hits.iter().map(|(key, _)| key.clone()).collect();
    assert_eq!(
        keys,
        vec![
            OrderKey::Value(Some(Value::U64(30))),
            OrderKey::Value(Some(Value::U64(10))),
            OrderKey::Value(Some(Value::U64(10))),
            OrderKey::Value(None),
        ]
    );
    assert_eq!(
        titles(&index, &result.addresses()),
        vec!["green apple", "red apple", "red banana", "red car"]
    );
    assert!(result.hits[1].1 < result.hits[2].1);

    let bad = SearchRequest::new(Query::all()).with_order_by("title");
    assert!(matches!(
        searcher.execute(&bad),
        Err(ShowdexError::InvalidArgument(_))
    ));
}

#[test]
fn doc_lookup_and_term_stats() {
    let index = fruit_index();
    let searcher = index.searcher();

    let doc = searcher.doc(DocAddress::new(0, 0)).unwrap();
    assert_eq!(doc.get_first("year"), Some(&Value::I64(1999)));
    assert_eq!(
        doc.get_first("aired"),
        Some(&Value::Date(Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap()))
    );

    assert!(matches!(
        searcher.doc(DocAddress::new(0, 4)),
        Err(ShowdexError::InvalidAddress { .. })
    ));
    assert!(matches!(
        searcher.doc(DocAddress::new(1, 0)),
        Err(ShowdexError::InvalidAddress { .. })
    ));

    let title = index.schema().get_field("title").unwrap();
    assert_eq!(searcher.doc_freq(&Term::from_field_text(title, "red")).unwrap(), 3);
    assert_eq!(searcher.doc_freq(&Term::from_field_text(title, "pear")).unwrap(), 0);
}

#[test]
fn dict_round_trip() {
    let schema = create_schema();
    let mut doc = Document::new();
    doc.add_text("title", "first");
    doc.add_text("title", "second");
    doc.add_i64("year", -5);
    doc.add_date("aired", Utc.with_ymd_and_hms(2023, 6, 1, 12, 30, 0).unwrap());
    doc.add_u64("views", 7);
    doc.add_facet("category", Facet::from_string("/a/b\\/c").unwrap());

    let dict = doc.to_dict();
    assert!(dict["title"].is_array());
    assert_eq!(Document::from_dict(&dict, &schema).unwrap(), doc);
}

#[test]
fn syntax_errors_report_position() {
    let index = fruit_index();
    match index.parse_query("title:red AND (", &["title"]) {
        Err(ShowdexError::QuerySyntax { position, .. }) => assert_eq!(position, 15),
        other => panic!("expected syntax error, got {:?}", other),
    }
    assert!(matches!(
        index.parse_query("nope:red", &["title"]),
        Err(ShowdexError::QuerySyntax { .. })
    ));
}
