//! Unit tests for the table dependency graph and database model.

use trimdump::error::ConfigError;
use trimdump::schema::{Database, DependencyGraph, EdgeOutcome, TableId};

fn graph(n: usize) -> DependencyGraph {
    let mut g = DependencyGraph::new();
    for _ in 0..n {
        g.add_vertex();
    }
    g
}

mod graph_tests {
    use super::*;

    #[test]
    fn test_topo_sort_parents_first() {
        // 2 -> 0 -> 1, 2 -> 3
        let mut g = graph(4);
        g.add_edge(TableId(2), TableId(0)).unwrap();
        g.add_edge(TableId(0), TableId(1)).unwrap();
        g.add_edge(TableId(2), TableId(3)).unwrap();

        let order = g.topo_sort();
        let pos = |id: TableId| order.iter().position(|&t| t == id).unwrap();
        assert!(pos(TableId(2)) < pos(TableId(0)));
        assert!(pos(TableId(0)) < pos(TableId(1)));
        assert!(pos(TableId(2)) < pos(TableId(3)));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn test_topo_sort_is_stable() {
        let mut g = graph(5);
        g.add_edge(TableId(4), TableId(1)).unwrap();
        g.add_edge(TableId(3), TableId(1)).unwrap();

        assert_eq!(g.topo_sort(), g.topo_sort());
        assert_eq!(
            g.topo_sort(),
            vec![TableId(0), TableId(2), TableId(3), TableId(4), TableId(1)]
        );
    }

    #[test]
    fn test_cycle_edge_rejected_and_graph_unchanged() {
        let mut g = graph(3);
        g.add_edge(TableId(0), TableId(1)).unwrap();
        g.add_edge(TableId(1), TableId(2)).unwrap();

        let err = g.add_edge(TableId(2), TableId(0)).unwrap_err();
        assert_eq!(err.parent, TableId(2));
        assert_eq!(err.child, TableId(0));
        assert!(!g.has_edge(TableId(2), TableId(0)));
        assert!(g.parents(TableId(0)).is_empty());
    }

    #[test]
    fn test_duplicate_edge() {
        let mut g = graph(2);
        assert_eq!(g.add_edge(TableId(0), TableId(1)), Ok(EdgeOutcome::Added));
        assert_eq!(g.add_edge(TableId(0), TableId(1)), Ok(EdgeOutcome::Duplicate));
        assert_eq!(g.children(TableId(0)), &[TableId(1)]);
    }

    #[test]
    fn test_ancestors_and_descendants() {
        let mut g = graph(4);
        g.add_edge(TableId(0), TableId(1)).unwrap();
        g.add_edge(TableId(1), TableId(2)).unwrap();
        g.add_edge(TableId(0), TableId(3)).unwrap();

        let mut descendants = g.descendants(TableId(0));
        descendants.sort();
        assert_eq!(descendants, vec![TableId(1), TableId(2), TableId(3)]);
        assert_eq!(g.ancestors(TableId(2)), vec![TableId(1), TableId(0)]);
        assert!(g.is_ancestor(TableId(0), TableId(2)));
        assert!(!g.is_ancestor(TableId(3), TableId(2)));
        assert!(!g.is_ancestor(TableId(2), TableId(2)));
    }
}

mod database_tests {
    use super::*;

    #[test]
    fn test_duplicate_table_rejected() {
        let mut db = Database::new("shop", None);
        db.add_table("users").unwrap();
        let err = db.add_table("users").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTable { ref table, .. } if table == "users"));
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn test_destination_defaults_to_name() {
        assert_eq!(Database::new("shop", None).destination, "shop");
        assert_eq!(Database::new("shop", Some(String::new())).destination, "shop");
        assert_eq!(
            Database::new("shop", Some("shop_copy".to_string())).destination,
            "shop_copy"
        );
    }

    #[test]
    fn test_dump_order_covers_every_table() {
        let mut db = Database::new("shop", None);
        let orders = db.add_table("orders").unwrap();
        let customers = db.add_table("customers").unwrap();
        let items = db.add_table("items").unwrap();
        db.graph.add_edge(customers, orders).unwrap();
        db.graph.add_edge(orders, items).unwrap();

        assert_eq!(db.dump_order(), vec![customers, orders, items]);
        assert_eq!(db.table(orders).name, "orders");
        assert_eq!(db.get_table_id("items"), Some(items));
    }
}
