//! Unit tests for the mask and redact rules.

use trimdump::config::RuleDecl;
use trimdump::error::{ConfigError, RuleError};
use trimdump::parser::{InsertStatement, SqlValue};
use trimdump::rules::{self, MaskRule, RedactRule, Row, Rule};
use trimdump::schema::{Column, ColumnInfo, ColumnKind, Table, TableId};

fn users_table() -> Table {
    let id = TableId(0);
    let mut table = Table::new("users", id);
    table.set_columns(
        [
            ColumnInfo::new("id", "int", 1).primary_key(),
            ColumnInfo::new("email", "varchar", 2),
            ColumnInfo::new("score", "double", 3),
            ColumnInfo::new("avatar", "blob", 4),
            ColumnInfo::new("born_at", "date", 5),
            ColumnInfo::new("balance", "decimal", 6),
            ColumnInfo::new("prefs", "json", 7),
            ColumnInfo::new("location", "point", 8),
        ]
        .into_iter()
        .map(|info| Column::from_info(info, id))
        .collect(),
    );
    table
}

fn user_row() -> Vec<SqlValue> {
    vec![
        SqlValue::Integer(7),
        SqlValue::String(b"jane doe@example.com".to_vec()),
        SqlValue::Number("4.5".to_string()),
        SqlValue::Hex(vec![0xCA, 0xFE]),
        SqlValue::String(b"1990-01-02".to_vec()),
        SqlValue::Number("12.50".to_string()),
        SqlValue::String(b"{}".to_vec()),
        SqlValue::Other("ST_GeomFromText('POINT(1 1)')".to_string()),
    ]
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

mod mask_tests {
    use super::*;

    #[test]
    fn test_default_mask_keeps_whitespace() {
        let table = users_table();
        let mut values = user_row();
        let rule = MaskRule::new(columns(&["email"]), None, None).unwrap();

        let changed = rule.apply(&mut Row::new(&table, &mut values)).unwrap();

        assert_eq!(changed, 1);
        assert_eq!(values[1], SqlValue::String(b"**** ***************".to_vec()));
        assert_eq!(values[0], SqlValue::Integer(7));
    }

    #[test]
    fn test_custom_pattern_and_surrogate() {
        let table = users_table();
        let mut values = user_row();
        let rule = MaskRule::new(columns(&["email"]), Some(r"@.*$"), Some("@example.invalid")).unwrap();

        rule.apply(&mut Row::new(&table, &mut values)).unwrap();
        assert_eq!(
            values[1],
            SqlValue::String(b"jane doe@example.invalid".to_vec())
        );
    }

    #[test]
    fn test_surrogate_is_literal() {
        let table = users_table();
        let mut values = user_row();
        let rule = MaskRule::new(columns(&["email"]), Some("doe"), Some("$0$1")).unwrap();

        rule.apply(&mut Row::new(&table, &mut values)).unwrap();
        assert_eq!(
            values[1],
            SqlValue::String(b"jane $0$1@example.com".to_vec())
        );
    }

    #[test]
    fn test_non_matching_pattern_leaves_value_untouched() {
        let table = users_table();
        let mut values = user_row();
        let before = values.clone();
        let rule = MaskRule::new(columns(&["email", "born_at"]), Some("zzz"), None).unwrap();

        let changed = rule.apply(&mut Row::new(&table, &mut values)).unwrap();

        assert_eq!(changed, 0);
        assert_eq!(values, before);
    }

    #[test]
    fn test_hex_stays_hex() {
        let table = users_table();
        let mut values = user_row();
        let rule = MaskRule::new(columns(&["avatar"]), Some("(?-u:.)"), Some("x")).unwrap();

        rule.apply(&mut Row::new(&table, &mut values)).unwrap();
        assert_eq!(values[3], SqlValue::Hex(b"xx".to_vec()));
    }

    #[test]
    fn test_default_mask_covers_binary_bytes() {
        let table = users_table();
        let mut values = user_row();
        values[3] = SqlValue::Hex(vec![0xCA, 0xFE, 0x41]);
        let rule = MaskRule::new(columns(&["avatar"]), None, None).unwrap();

        let changed = rule.apply(&mut Row::new(&table, &mut values)).unwrap();

        assert_eq!(changed, 1);
        assert_eq!(values[3], SqlValue::Hex(b"***".to_vec()));
    }

    #[test]
    fn test_default_mask_covers_latin1_bytes() {
        let table = users_table();
        let mut values = user_row();
        values[1] = SqlValue::String(b"Jos\xe9".to_vec());
        let rule = MaskRule::new(columns(&["email"]), None, None).unwrap();

        rule.apply(&mut Row::new(&table, &mut values)).unwrap();
        assert_eq!(values[1], SqlValue::String(b"****".to_vec()));
    }

    #[test]
    fn test_default_mask_counts_codepoints() {
        let table = users_table();
        let mut values = user_row();
        values[1] = SqlValue::String("José".as_bytes().to_vec());
        let rule = MaskRule::new(columns(&["email"]), None, None).unwrap();

        rule.apply(&mut Row::new(&table, &mut values)).unwrap();
        assert_eq!(values[1], SqlValue::String(b"****".to_vec()));
    }

    #[test]
    fn test_default_mask_on_parsed_insert() {
        let table = users_table();
        let mut stmt =
            InsertStatement::parse(b"INSERT INTO `users` (`avatar`,`email`) VALUES (0xCAFE41,'Jos\xe9')")
                .unwrap();
        let rule = MaskRule::new(columns(&["avatar", "email"]), None, None).unwrap();

        let (cols, rows) = stmt.parts_mut();
        let changed = rule
            .apply(&mut Row::new(&table, &mut rows[0]).with_columns(cols))
            .unwrap();

        assert_eq!(changed, 2);
        assert_eq!(rows[0][0], SqlValue::Hex(b"***".to_vec()));
        assert_eq!(rows[0][1], SqlValue::String(b"****".to_vec()));
        assert!(stmt.to_bytes().ends_with(b"(0x2A2A2A,'****')"));
    }

    #[test]
    fn test_masked_number_becomes_string() {
        let table = users_table();
        let mut values = user_row();
        let rule = MaskRule::new(columns(&["id"]), None, None).unwrap();

        rule.apply(&mut Row::new(&table, &mut values)).unwrap();
        assert_eq!(values[0], SqlValue::String(b"*".to_vec()));
    }

    #[test]
    fn test_null_and_raw_values_are_skipped() {
        let table = users_table();
        let mut values = user_row();
        values[1] = SqlValue::Null;
        let rule = MaskRule::new(columns(&["email", "location"]), None, None).unwrap();

        let changed = rule.apply(&mut Row::new(&table, &mut values)).unwrap();

        assert_eq!(changed, 0);
        assert_eq!(values[1], SqlValue::Null);
        assert!(matches!(values[7], SqlValue::Other(_)));
    }

    #[test]
    fn test_invalid_pattern_rejected_at_configuration() {
        let mut decl = RuleDecl::new("mask", &["email"]);
        decl.pattern = Some("(".to_string());

        let err = rules::configure("users", &decl).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRule { .. }));
    }
}

mod redact_tests {
    use super::*;

    #[test]
    fn test_redact_zero_values_by_kind() {
        let table = users_table();
        let mut values = user_row();
        let rule = RedactRule::new(columns(&["id", "email", "score", "avatar", "born_at"]));

        let changed = rule.apply(&mut Row::new(&table, &mut values)).unwrap();

        assert_eq!(changed, 5);
        assert_eq!(values[0], SqlValue::Integer(0));
        assert_eq!(values[1], SqlValue::String(Vec::new()));
        assert_eq!(values[2], SqlValue::Integer(0));
        assert_eq!(values[3], SqlValue::String(Vec::new()));
        assert_eq!(values[4], SqlValue::String(Vec::new()));
    }

    #[test]
    fn test_redact_null_is_kept() {
        let table = users_table();
        let mut values = user_row();
        values[1] = SqlValue::Null;
        let rule = RedactRule::new(columns(&["email"]));

        let changed = rule.apply(&mut Row::new(&table, &mut values)).unwrap();
        assert_eq!(changed, 0);
        assert_eq!(values[1], SqlValue::Null);
    }

    #[test]
    fn test_redact_decimal_not_implemented() {
        let table = users_table();
        let mut values = user_row();
        let rule = RedactRule::new(columns(&["balance"]));

        let err = rule.apply(&mut Row::new(&table, &mut values)).unwrap_err();
        assert!(matches!(
            err,
            RuleError::NotImplemented { ref column, kind: ColumnKind::Decimal } if column == "balance"
        ));
    }

    #[test]
    fn test_redact_json_not_implemented() {
        let table = users_table();
        let mut values = user_row();
        let rule = RedactRule::new(columns(&["prefs"]));

        let err = rule.apply(&mut Row::new(&table, &mut values)).unwrap_err();
        assert!(matches!(err, RuleError::NotImplemented { kind: ColumnKind::Json, .. }));
    }

    #[test]
    fn test_redact_unknown_type_unsupported() {
        let table = users_table();
        let mut values = user_row();
        let rule = RedactRule::new(columns(&["location"]));

        let err = rule.apply(&mut Row::new(&table, &mut values)).unwrap_err();
        assert!(matches!(
            err,
            RuleError::UnsupportedType { ref data_type, .. } if data_type == "point"
        ));
    }
}

mod row_tests {
    use super::*;

    #[test]
    fn test_explicit_column_list_is_honoured() {
        let table = users_table();
        let list = columns(&["email", "id"]);
        let mut values = vec![
            SqlValue::String(b"a@b.c".to_vec()),
            SqlValue::Integer(3),
        ];
        let rule = RedactRule::new(columns(&["id"]));

        let mut row = Row::new(&table, &mut values).with_columns(Some(list.as_slice()));
        rule.apply(&mut row).unwrap();

        assert_eq!(values[0], SqlValue::String(b"a@b.c".to_vec()));
        assert_eq!(values[1], SqlValue::Integer(0));
    }

    #[test]
    fn test_rules_never_change_row_shape() {
        let table = users_table();
        let mut values = user_row();
        let mask = rules::configure("users", &RuleDecl::new("mask", &["email", "born_at"])).unwrap();
        let redact = rules::configure("users", &RuleDecl::new("redact", &["id", "score"])).unwrap();
        let all = vec![mask, redact];

        let changed = rules::apply_all(&all, &mut Row::new(&table, &mut values)).unwrap();

        assert_eq!(changed, 4);
        assert_eq!(values.len(), 8);
        assert!(matches!(values[5], SqlValue::Number(ref n) if n == "12.50"));
        assert!(matches!(values[7], SqlValue::Other(_)));
    }

    #[test]
    fn test_missing_column_is_ignored() {
        let table = users_table();
        let mut values = user_row();
        let rule = RedactRule::new(columns(&["nickname"]));

        assert_eq!(rule.apply(&mut Row::new(&table, &mut values)).unwrap(), 0);
    }

    #[test]
    fn test_unknown_rule_type() {
        let err = rules::configure("users", &RuleDecl::new("shuffle", &["email"])).unwrap_err();
        assert!(matches!(err, ConfigError::UnrecognizedRuleType { .. }));
    }

    #[test]
    fn test_rule_without_columns() {
        let err = rules::configure("users", &RuleDecl::new("redact", &[])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRule { .. }));
    }
}
