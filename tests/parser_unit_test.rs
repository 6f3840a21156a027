//! Unit tests for line classification and INSERT parsing of mysqldump output.

use trimdump::error::ParseError;
use trimdump::parser::{classify, is_insert, InsertStatement, SqlValue, StatementType};

mod classify_tests {
    use super::*;

    #[test]
    fn test_classify_dump_lines() {
        assert_eq!(classify(b"INSERT INTO `t` VALUES (1);"), StatementType::Insert);
        assert_eq!(classify(b"  insert ignore into t values (1);"), StatementType::Insert);
        assert_eq!(classify(b"USE `shop`;"), StatementType::Use);
        assert_eq!(classify(b"-- Dumping data for table `t`"), StatementType::Comment);
        assert_eq!(classify(b"/*!40101 SET NAMES utf8mb4 */;"), StatementType::Comment);
        assert_eq!(classify(b""), StatementType::Blank);
        assert_eq!(classify(b"   \t"), StatementType::Blank);
        assert_eq!(classify(b"LOCK TABLES `t` WRITE;"), StatementType::Other);
    }

    #[test]
    fn test_keyword_needs_word_boundary() {
        assert!(!is_insert(b"INSERTED_ROWS = 1"));
        assert_eq!(classify(b"USER_VARIABLES"), StatementType::Other);
        assert!(is_insert(b"INSERT"));
    }
}

mod insert_tests {
    use super::*;

    #[test]
    fn test_mysqldump_extended_insert() {
        let line = b"INSERT INTO `users` VALUES (1,'a@example.com',NULL),(2,'b@example.com','x\\'y');";
        let stmt = InsertStatement::parse(line).unwrap();

        assert_eq!(stmt.table(), "users");
        assert_eq!(stmt.rows.len(), 2);
        assert_eq!(stmt.rows[1][2], SqlValue::String(b"x'y".to_vec()));
        assert_eq!(stmt.to_bytes(), line[..line.len() - 1].to_vec());
    }

    #[test]
    fn test_escapes_decode_and_reencode() {
        let stmt = InsertStatement::parse(b"INSERT INTO t VALUES ('tab\\there','nul\\0','ctrl\\Z')").unwrap();
        assert_eq!(stmt.rows[0][0], SqlValue::String(b"tab\there".to_vec()));
        assert_eq!(stmt.rows[0][1], SqlValue::String(b"nul\0".to_vec()));
        assert_eq!(stmt.rows[0][2], SqlValue::String(b"ctrl\x1a".to_vec()));

        let mut out = Vec::new();
        stmt.rows[0][1].write_sql(&mut out);
        assert_eq!(out, b"'nul\\0'".to_vec());
    }

    #[test]
    fn test_hex_literals() {
        let stmt = InsertStatement::parse(b"INSERT INTO t VALUES (0xdeadBEEF,X'00ff',0x)").unwrap();
        assert_eq!(stmt.rows[0][0], SqlValue::Hex(vec![0xDE, 0xAD, 0xBE, 0xEF]));
        assert_eq!(stmt.rows[0][1], SqlValue::Hex(vec![0x00, 0xFF]));

        let mut out = Vec::new();
        stmt.rows[0][0].write_sql(&mut out);
        assert_eq!(out, b"0xDEADBEEF".to_vec());
    }

    #[test]
    fn test_big_integers() {
        let stmt =
            InsertStatement::parse(b"INSERT INTO t VALUES (18446744073709551615,-9223372036854775808)").unwrap();
        assert_eq!(stmt.rows[0][0], SqlValue::BigInteger(18446744073709551615));
        assert_eq!(stmt.rows[0][1], SqlValue::Integer(i64::MIN));
    }

    #[test]
    fn test_modifiers_and_value_keyword() {
        let stmt = InsertStatement::parse(b"INSERT LOW_PRIORITY IGNORE INTO `t` VALUE (1)").unwrap();
        assert_eq!(stmt.rows, vec![vec![SqlValue::Integer(1)]]);
    }

    #[test]
    fn test_truncated_statement_is_an_error() {
        assert!(matches!(
            InsertStatement::parse(b"INSERT INTO t VALUES (1,'a'),"),
            Err(ParseError::UnexpectedEnd { .. }) | Err(ParseError::Unexpected { .. })
        ));
    }
}
