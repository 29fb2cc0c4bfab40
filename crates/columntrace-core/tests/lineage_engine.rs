use columntrace_core::{
    resolve_column_traces, resolve_columns_lineage, ColumnsLineage, LineageError, Path, Relation,
};
use rstest::rstest;

fn relation(name: &str, columns: &[&str]) -> Relation {
    Relation::new(Path::from_identifier(name), columns.iter().copied())
}

fn lineage(sql: &str, relations: &[Relation]) -> ColumnsLineage {
    resolve_columns_lineage(sql, relations)
        .unwrap_or_else(|err| panic!("lineage for {sql:?} failed: {err}"))
}

fn output_columns(result: &ColumnsLineage) -> Vec<&str> {
    result.keys().map(String::as_str).collect()
}

#[test]
fn renamed_column_maps_to_its_base_column() {
    let t = relation("t", &["x", "z"]);
    let result = lineage("SELECT x AS y FROM t", &[t.clone()]);

    assert_eq!(output_columns(&result), ["y"]);
    assert_eq!(result["y"][&t], ["x"]);

    let traces = resolve_column_traces("SELECT x AS y FROM t", &[t]).expect("traces");
    assert_eq!(traces["y"].formula, "x");
}

#[test]
fn expression_collects_both_operands() {
    let t = relation("t", &["a", "b"]);
    let traces = resolve_column_traces("SELECT a + b AS s FROM t", &[t.clone()]).expect("traces");

    assert_eq!(traces["s"].lineage[&t], ["a", "b"]);
    assert_eq!(traces["s"].formula, "a + b");
}

#[test]
fn cte_hop_collapses_to_the_base_table() {
    let t = relation("t", &["x"]);
    let result = lineage(
        "WITH c AS (SELECT x AS y FROM t) SELECT y AS z FROM c",
        &[t.clone()],
    );

    assert_eq!(output_columns(&result), ["z"]);
    assert_eq!(result["z"][&t], ["x"]);
}

#[test]
fn bare_star_expands_every_column() {
    let t = relation("t", &["a", "b"]);
    let result = lineage("SELECT * FROM t", &[t.clone()]);

    assert_eq!(output_columns(&result), ["a", "b"]);
    assert_eq!(result["a"][&t], ["a"]);
    assert_eq!(result["b"][&t], ["b"]);
}

#[test]
fn qualified_star_mixes_with_plain_columns() {
    let t = relation("t", &["a", "b"]);
    let u = relation("u", &["k"]);
    let result = lineage("SELECT t.*, u.k FROM t, u", &[t.clone(), u.clone()]);

    assert_eq!(result["a"][&t], ["a"]);
    assert_eq!(result["b"][&t], ["b"]);
    assert_eq!(result["k"][&u], ["k"]);
}

#[test]
fn cyclic_ctes_are_rejected() {
    let err = resolve_columns_lineage(
        "WITH a AS (SELECT x FROM b), b AS (SELECT x FROM a) SELECT x FROM a",
        &[],
    )
    .unwrap_err();
    assert!(matches!(err, LineageError::CyclicCte(_)));
}

#[rstest]
#[case("")]
#[case("   ")]
#[case("-- nothing\n")]
#[case("CREATE TABLE t (a int)")]
fn inputs_without_a_select_fail(#[case] sql: &str) {
    let err = resolve_columns_lineage(sql, &[]).unwrap_err();
    assert!(matches!(err, LineageError::RootNotFound));
}

#[test]
fn single_reference_expression_without_alias_keeps_the_column_name() {
    let t = relation("t", &["x"]);
    let result = lineage("SELECT x + 1 FROM t", &[t.clone()]);
    assert_eq!(output_columns(&result), ["x"]);
    assert_eq!(result["x"][&t], ["x"]);
}

#[test]
fn overlong_column_reference_is_rejected() {
    let err = resolve_columns_lineage(
        "SELECT db.sc.t.col.x FROM db.sc.t",
        &[Relation::new(Path::from_parts(&["db", "sc", "t"]).unwrap(), ["col"])],
    )
    .unwrap_err();
    assert!(matches!(err, LineageError::TooManyPathComponents(_)));
}

#[test]
fn unaliased_multi_column_expression_is_rejected() {
    let t = relation("t", &["a", "b"]);
    let err = resolve_columns_lineage("SELECT a + b FROM t", &[t]).unwrap_err();
    assert!(matches!(err, LineageError::AmbiguousFieldName(2)));
}

#[test]
fn unknown_from_entry_is_rejected() {
    let err = resolve_columns_lineage("SELECT a FROM missing", &[]).unwrap_err();
    match err {
        LineageError::SourceReferenceNotFound(path) => {
            assert_eq!(path.identifier(), Some("missing"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unknown_bare_column_is_rejected() {
    let t = relation("t", &["a"]);
    let err = resolve_columns_lineage("SELECT nope FROM t", &[t]).unwrap_err();
    assert!(matches!(err, LineageError::SourceNotFound(name) if name == "nope"));
}

#[test]
fn cte_without_the_referenced_column_is_rejected() {
    let t = relation("t", &["x"]);
    let err = resolve_columns_lineage(
        "WITH c AS (SELECT x AS y FROM t) SELECT c.gone AS out FROM c",
        &[t],
    )
    .unwrap_err();
    assert!(matches!(err, LineageError::FieldNotFound { .. }));
}

#[test]
fn aliased_source_scopes_qualified_references() {
    let orders = relation("orders", &["id", "amount"]);
    let result = lineage(
        "SELECT o.amount AS spent FROM orders AS o",
        &[orders.clone()],
    );
    assert_eq!(result["spent"][&orders], ["amount"]);
}

#[test]
fn schema_qualified_relations_resolve_verbatim() {
    let t = Relation::new(Path::from_parts(&["shop", "orders"]).unwrap(), ["total"]);
    let result = lineage("SELECT total AS t FROM shop.orders", &[t.clone()]);
    assert_eq!(result["t"][&t], ["total"]);
}

#[test]
fn chained_ctes_inline_their_formulas() {
    let t = relation("t", &["x"]);
    let traces = resolve_column_traces(
        "WITH a AS (SELECT x + 1 AS p FROM t), \
              b AS (SELECT p * 2 AS q FROM a) \
         SELECT q AS result FROM b",
        &[t.clone()],
    )
    .expect("traces");

    assert_eq!(traces["result"].lineage[&t], ["x"]);
    assert_eq!(traces["result"].formula, "x + 1 * 2");
}

#[test]
fn cte_declaration_order_is_irrelevant() {
    let t = relation("t", &["x"]);
    let result = lineage(
        "WITH b AS (SELECT p AS q FROM a), \
              a AS (SELECT x AS p FROM t) \
         SELECT q AS out FROM b",
        &[t.clone()],
    );
    assert_eq!(result["out"][&t], ["x"]);
}

#[test]
fn star_through_a_cte_uses_output_names() {
    let t = relation("t", &["x"]);
    let result = lineage(
        "WITH c AS (SELECT x AS y FROM t) SELECT * FROM c",
        &[t.clone()],
    );
    assert_eq!(output_columns(&result), ["y"]);
    assert_eq!(result["y"][&t], ["x"]);
}

#[test]
fn multiple_sources_contribute_to_one_column() {
    let t = relation("t", &["a"]);
    let u = relation("u", &["b"]);
    let traces = resolve_column_traces(
        "SELECT t.a + u.b AS s FROM t JOIN u ON t.a = u.b",
        &[t.clone(), u.clone()],
    )
    .expect("traces");

    assert_eq!(traces["s"].lineage[&t], ["a"]);
    assert_eq!(traces["s"].lineage[&u], ["b"]);
    // qualified references inline down to the bare base-column names
    assert_eq!(traces["s"].formula, "a + b");
}

#[test]
fn comments_do_not_disturb_formulas() {
    let t = relation("t", &["a", "b"]);
    let traces = resolve_column_traces(
        "SELECT a /* plus */ + b AS s -- the sum\nFROM t",
        &[t.clone()],
    )
    .expect("traces");

    assert_eq!(traces["s"].lineage[&t], ["a", "b"]);
    assert_eq!(traces["s"].formula, "a   + b");
}

#[test]
fn function_expressions_trace_their_arguments() {
    let t = relation("t", &["a", "b"]);
    let traces = resolve_column_traces(
        "SELECT coalesce(a, b, 0) AS c FROM t",
        &[t.clone()],
    )
    .expect("traces");

    assert_eq!(traces["c"].lineage[&t], ["a", "b"]);
    assert_eq!(traces["c"].formula, "coalesce(a, b, 0)");
}

#[test]
fn constants_have_no_lineage() {
    let t = relation("t", &["a"]);
    let result = lineage("SELECT 1 AS one, a AS keep FROM t", &[t.clone()]);
    assert!(result["one"].is_empty());
    assert_eq!(result["keep"][&t], ["a"]);
}

#[test]
fn duplicate_output_names_are_rejected() {
    let a = relation("a", &["k"]);
    let b = relation("b", &["k"]);
    let err = resolve_columns_lineage("SELECT * FROM a, b", &[a, b]).unwrap_err();
    assert!(matches!(err, LineageError::DuplicateFieldName(name) if name == "k"));
}

#[test]
fn unused_cte_does_not_disturb_the_result() {
    let t = relation("t", &["x"]);
    let result = lineage(
        "WITH unused AS (SELECT x AS y FROM t) SELECT x AS z FROM t",
        &[t.clone()],
    );
    assert_eq!(output_columns(&result), ["z"]);
    assert_eq!(result["z"][&t], ["x"]);
}

#[test]
fn running_twice_yields_equal_results() {
    let t = relation("t", &["a", "b"]);
    let u = relation("u", &["k"]);
    let sql = "WITH c AS (SELECT a + b AS s FROM t) SELECT c.s AS total, u.k FROM c, u";
    let relations = [t, u];

    let first = lineage(sql, &relations);
    let second = lineage(sql, &relations);
    assert_eq!(first, second);
}

#[rstest]
#[case("SELECT x AS y FROM t", &["y"])]
#[case("SELECT x AS y, x AS w FROM t", &["y", "w"])]
#[case("SELECT * FROM t", &["x"])]
fn output_keys_match_the_projection(#[case] sql: &str, #[case] expected: &[&str]) {
    let t = relation("t", &["x"]);
    let result = lineage(sql, &[t]);
    assert_eq!(output_columns(&result), expected);
}
