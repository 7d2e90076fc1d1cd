//! Table reference rewriting
//!
//! Replaces literal `FROM <table>` / `JOIN <table>` references with dbt
//! `ref()` / `source()` calls and prepends a `config()` header.
//!
//! Matching is textual, not a SQL parse. A reference is the keyword (at the
//! start of a word), at least one whitespace character, then either
//! `segment.segment` or a single segment of `[A-Za-z0-9_]`. Backtick quoting
//! is accepted around the whole name (`` `a.b` ``) or around each part
//! (`` `a`.`b` ``) and stripped before lookup.
//! Whitespace after the identifier belongs to the match and is normalized to
//! a single space when the reference is replaced. Anything the pattern does
//! not cover (bracket or double-quote quoting, partial backticks, quoted
//! three-part names, subqueries) is left exactly as written.
//!
//! Each reference resolves through the first step that hits:
//! 1. `schema.table` → model named `schema_table`
//! 2. last segment → model with that name
//! 3. full identifier → source `<group>.<table>`
//! 4. unchanged

use dbtify_core::{RewriteError, RewriteRequest, RewriteResult, Resolution, ResolutionRule};
use dbtify_dbt::{CatalogHandle, CatalogIndex, CatalogKind};
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

static TABLE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?P<clause>FROM|JOIN)\s+(?P<table>`?[A-Za-z0-9_]+`?(?:\.`?[A-Za-z0-9_]+`?)?)\s*",
    )
    .unwrap()
});

/// Rewrites raw SQL against a catalog index
pub struct ReferenceRewriter;

impl ReferenceRewriter {
    /// Rewrite every table reference in `request.sql` and add the config header
    ///
    /// Unknown tables are not an error; they are passed through.
    pub fn rewrite(index: &CatalogIndex, request: &RewriteRequest) -> RewriteResult {
        let sql = request.sql.as_str();
        let mut body = String::with_capacity(sql.len() + sql.len() / 2);
        let mut resolutions = Vec::new();
        let mut last_end = 0;

        for caps in TABLE_REFERENCE.captures_iter(sql) {
            let Some(whole) = caps.get(0) else { continue };

            body.push_str(&sql[last_end..whole.start()]);
            last_end = whole.end();

            let (resolution, replacement) = Self::rewrite_match(index, sql, &caps);
            body.push_str(replacement.as_deref().unwrap_or(whole.as_str()));
            resolutions.push(resolution);
        }
        body.push_str(&sql[last_end..]);

        tracing::debug!(
            object = %request.object_name,
            object_type = %request.object_type,
            references = resolutions.len(),
            resolved = resolutions.iter().filter(|r| r.is_resolved()).count(),
            "rewrote table references"
        );

        RewriteResult {
            rewritten_sql: format!("{}\n\n{}", Self::config_header(&request.object_name), body),
            resolutions,
        }
    }

    /// Rewrite against the snapshot currently published in `handle`
    pub fn rewrite_published(
        handle: &CatalogHandle,
        request: &RewriteRequest,
    ) -> Result<RewriteResult, RewriteError> {
        let index = handle.snapshot()?;
        Ok(Self::rewrite(&index, request))
    }

    /// Resolve a bare or dotted table identifier
    ///
    /// Returns the rule that hit and the rendered reference, or
    /// `Unresolved` with `None`.
    pub fn resolve<'a>(index: &'a CatalogIndex, table: &str) -> (ResolutionRule, Option<&'a str>) {
        if let Some((schema, base_table)) = table.split_once('.') {
            let composed_key = format!("{}_{}", schema, base_table);
            if let Some(rendered) = index.lookup(&composed_key, CatalogKind::Model) {
                return (ResolutionRule::ComposedModel, Some(rendered));
            }
        }

        let bare_key = table.rsplit('.').next().unwrap_or(table);
        if let Some(rendered) = index.lookup(bare_key, CatalogKind::Model) {
            return (ResolutionRule::BareModel, Some(rendered));
        }

        if let Some(rendered) = index.lookup(table, CatalogKind::Source) {
            return (ResolutionRule::Source, Some(rendered));
        }

        (ResolutionRule::Unresolved, None)
    }

    /// The `config()` block placed above the rewritten SQL
    pub fn config_header(object_name: &str) -> String {
        format!("{{{{ config(alias='{}') }}}}", object_name)
    }

    /// Resolve one match; `None` means keep the matched text
    fn rewrite_match(index: &CatalogIndex, sql: &str, caps: &Captures<'_>) -> (Resolution, Option<String>) {
        let clause = caps.name("clause").map_or("", |m| m.as_str());
        let Some(table_match) = caps.name("table") else {
            return (Self::unresolved(clause, ""), None);
        };
        let raw = table_match.as_str();

        // `a`.`b`.`c` stops matching after two parts; the rest is not ours to touch
        let part_quoted_tail = raw.ends_with('`') && sql[table_match.end()..].starts_with('.');

        let table = match Self::unquote(raw) {
            Some(table) if !part_quoted_tail => table,
            _ => {
                tracing::debug!(table = %raw, "unsupported quoting, leaving reference unchanged");
                return (Self::unresolved(clause, raw), None);
            }
        };

        match Self::resolve(index, &table) {
            (rule, Some(rendered)) => {
                tracing::debug!(%table, %rule, "resolved table reference");
                let replacement = format!("{} {} ", clause, rendered);
                let resolution = Resolution {
                    clause: clause.to_string(),
                    identifier: table.into_owned(),
                    rule,
                    rendered_ref: Some(rendered.to_string()),
                };
                (resolution, Some(replacement))
            }
            (_, None) => {
                tracing::debug!(%table, "no catalog entry, leaving reference unchanged");
                (Self::unresolved(clause, &table), None)
            }
        }
    }

    /// Strip backtick quoting from a matched identifier
    ///
    /// Accepts `a`, `a.b`, `` `a` ``, `` `a.b` `` and `` `a`.`b` ``. Any other
    /// placement of backticks returns `None`.
    fn unquote(raw: &str) -> Option<Cow<'_, str>> {
        if !raw.contains('`') {
            return Some(Cow::Borrowed(raw));
        }

        let inner = raw.strip_prefix('`')?.strip_suffix('`')?;
        if !inner.contains('`') {
            return Some(Cow::Borrowed(inner));
        }

        let (schema, table) = inner.split_once("`.`")?;
        if schema.contains('`') || table.contains('`') {
            return None;
        }
        Some(Cow::Owned(format!("{}.{}", schema, table)))
    }

    fn unresolved(clause: &str, table: &str) -> Resolution {
        Resolution {
            clause: clause.to_string(),
            identifier: table.to_string(),
            rule: ResolutionRule::Unresolved,
            rendered_ref: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbtify_core::ObjectType;
    use dbtify_dbt::{ModelDef, SourceDef};
    use pretty_assertions::assert_eq;

    fn index() -> CatalogIndex {
        CatalogIndex::build(
            &[
                ModelDef::new("bq_views_fsdfsdf", "bq_views"),
                ModelDef::new("dataset_id_gerg", "dataset_id"),
                ModelDef::new("orders", "marts"),
            ],
            &[
                SourceDef::new("raw", "payments", "raw_data"),
                SourceDef::new("raw", "orders", "raw_data"),
            ],
        )
    }

    fn rewrite(sql: &str) -> String {
        let request = RewriteRequest::new(sql, ObjectType::Table, "obj");
        let result = ReferenceRewriter::rewrite(&index(), &request);
        result
            .rewritten_sql
            .strip_prefix("{{ config(alias='obj') }}\n\n")
            .unwrap()
            .to_string()
    }

    #[test]
    fn header_format() {
        assert_eq!(ReferenceRewriter::config_header("gerg"), "{{ config(alias='gerg') }}");
    }

    #[test]
    fn bare_model() {
        assert_eq!(rewrite("SELECT * FROM orders"), "SELECT * FROM {{ ref('orders') }} ");
    }

    #[test]
    fn composed_model_from_backticks() {
        assert_eq!(
            rewrite("SELECT * FROM `bq_views.fsdfsdf`"),
            "SELECT * FROM {{ ref('bq_views_fsdfsdf') }} "
        );
    }

    #[test]
    fn composed_beats_bare_and_source() {
        let index = CatalogIndex::build(
            &[ModelDef::new("raw_orders", "raw"), ModelDef::new("orders", "marts")],
            &[SourceDef::new("raw", "orders", "raw_data")],
        );
        assert_eq!(
            ReferenceRewriter::resolve(&index, "raw.orders"),
            (ResolutionRule::ComposedModel, Some("{{ ref('raw_orders') }}"))
        );
    }

    #[test]
    fn bare_model_beats_source() {
        // raw.orders is also a source, but the `orders` model wins
        assert_eq!(
            ReferenceRewriter::resolve(&index(), "raw.orders"),
            (ResolutionRule::BareModel, Some("{{ ref('orders') }}"))
        );
    }

    #[test]
    fn source_fallback() {
        assert_eq!(
            rewrite("select * from raw.payments where amount > 0"),
            "select * from {{ source('raw', 'payments') }} where amount > 0"
        );
    }

    #[test]
    fn bare_identifier_never_matches_source() {
        assert_eq!(
            ReferenceRewriter::resolve(&index(), "payments"),
            (ResolutionRule::Unresolved, None)
        );
    }

    #[test]
    fn clause_case_is_preserved() {
        assert_eq!(
            rewrite("select a from orders join raw.payments on true"),
            "select a from {{ ref('orders') }} join {{ source('raw', 'payments') }} on true"
        );
    }

    #[test]
    fn whitespace_is_normalized_only_for_replacements() {
        assert_eq!(
            rewrite("SELECT *\nFROM\n    orders\n\nWHERE id = 1"),
            "SELECT *\nFROM {{ ref('orders') }} WHERE id = 1"
        );
        assert_eq!(
            rewrite("SELECT *\nFROM\n    unknown_table\n\nWHERE id = 1"),
            "SELECT *\nFROM\n    unknown_table\n\nWHERE id = 1"
        );
    }

    #[test]
    fn keyword_must_start_a_word() {
        // `date_from orders` is not a FROM clause
        assert_eq!(rewrite("SELECT date_from orders"), "SELECT date_from orders");
    }

    #[test]
    fn one_sided_backtick_is_left_alone() {
        assert_eq!(rewrite("SELECT * FROM `orders"), "SELECT * FROM `orders");
    }

    #[test]
    fn unsupported_quoting_passes_through() {
        assert_eq!(rewrite("SELECT * FROM [raw].[payments]"), "SELECT * FROM [raw].[payments]");
        assert_eq!(rewrite("SELECT * FROM \"orders\""), "SELECT * FROM \"orders\"");
    }

    #[test]
    fn three_part_backtick_name_is_left_alone() {
        assert_eq!(
            rewrite("SELECT * FROM `project.raw.payments`"),
            "SELECT * FROM `project.raw.payments`"
        );
    }

    #[test]
    fn part_quoted_name_is_treated_as_dotted() {
        let index = CatalogIndex::build(
            &[ModelDef::new("bq_views", "bq_views"), ModelDef::new("bq_views_fsdfsdf", "bq_views")],
            &[],
        );
        let request = RewriteRequest::new("SELECT * FROM `bq_views`.`fsdfsdf`", ObjectType::Table, "x");
        let result = ReferenceRewriter::rewrite(&index, &request);

        assert_eq!(
            result.rewritten_sql,
            "{{ config(alias='x') }}\n\nSELECT * FROM {{ ref('bq_views_fsdfsdf') }} "
        );
        assert_eq!(result.resolutions[0].identifier, "bq_views.fsdfsdf");
        assert_eq!(result.resolutions[0].rule, ResolutionRule::ComposedModel);
    }

    #[test]
    fn part_quoted_name_without_entry_is_left_alone() {
        let index = CatalogIndex::build(&[ModelDef::new("bq_views", "bq_views")], &[]);
        let request = RewriteRequest::new("SELECT * FROM `bq_views`.`other` t", ObjectType::Table, "x");
        let result = ReferenceRewriter::rewrite(&index, &request);

        assert_eq!(
            result.rewritten_sql,
            "{{ config(alias='x') }}\n\nSELECT * FROM `bq_views`.`other` t"
        );
    }

    #[test]
    fn part_quoted_three_part_name_is_left_alone() {
        assert_eq!(
            rewrite("SELECT * FROM `project`.`raw`.`payments` p"),
            "SELECT * FROM `project`.`raw`.`payments` p"
        );
        assert_eq!(
            rewrite("SELECT * FROM `raw.payments`.`x`"),
            "SELECT * FROM `raw.payments`.`x`"
        );
    }

    #[test]
    fn mixed_quoting_is_left_alone() {
        assert_eq!(rewrite("SELECT * FROM raw.`payments`"), "SELECT * FROM raw.`payments`");
        assert_eq!(rewrite("SELECT * FROM `raw`.payments"), "SELECT * FROM `raw`.payments");
    }

    #[test]
    fn unquote_forms() {
        assert_eq!(ReferenceRewriter::unquote("a").as_deref(), Some("a"));
        assert_eq!(ReferenceRewriter::unquote("`a.b`").as_deref(), Some("a.b"));
        assert_eq!(ReferenceRewriter::unquote("`a`.`b`").as_deref(), Some("a.b"));
        assert_eq!(ReferenceRewriter::unquote("`a.`b`").as_deref(), None);
        assert_eq!(ReferenceRewriter::unquote("a`").as_deref(), None);
    }

    #[test]
    fn resolutions_follow_input_order() {
        let request = RewriteRequest::new(
            "SELECT * FROM `dataset_id.gr` JOIN `bq_views.fsdfsdf` ON gr.id = fsdfsdf.id",
            ObjectType::Table,
            "fe",
        );
        let result = ReferenceRewriter::rewrite(&index(), &request);

        let rules: Vec<ResolutionRule> = result.resolutions.iter().map(|r| r.rule).collect();
        assert_eq!(rules, vec![ResolutionRule::Unresolved, ResolutionRule::ComposedModel]);
        assert_eq!(result.resolutions[0].identifier, "dataset_id.gr");
        assert_eq!(
            result.rewritten_sql,
            "{{ config(alias='fe') }}\n\nSELECT * FROM `dataset_id.gr` JOIN {{ ref('bq_views_fsdfsdf') }} ON gr.id = fsdfsdf.id"
        );
    }

    #[test]
    fn published_snapshot_is_required() {
        let handle = CatalogHandle::new();
        let request = RewriteRequest::new("SELECT 1", ObjectType::View, "v");
        assert!(matches!(
            ReferenceRewriter::rewrite_published(&handle, &request),
            Err(RewriteError::CatalogUnavailable(_))
        ));

        handle.publish(index());
        let result = ReferenceRewriter::rewrite_published(&handle, &request).unwrap();
        assert_eq!(result.rewritten_sql, "{{ config(alias='v') }}\n\nSELECT 1");
    }
}
