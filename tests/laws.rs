use deskfilter::filter::{count_leaves, Presence, SimpleFilter, SimpleFilterAdapter, Timespan};
use deskfilter::{
    Condition, ConditionValue, FieldCatalog, FieldDescriptor, FieldType, FilterCompiler, FilterMode, FilterSettings,
    Group, Node, Operator, OperatorCatalog, SimpleFilterMap,
};
use proptest::prelude::*;
use proptest::sample::{select, subsequence};

fn catalog() -> FieldCatalog {
    FieldCatalog::new(vec![
        FieldDescriptor::new("status", FieldType::SingleSelect).with_options(["Open", "Replied", "Closed"]),
        FieldDescriptor::new("subject", FieldType::Text),
        FieldDescriptor::new("reopen_count", FieldType::Numeric),
        FieldDescriptor::new("opening_date", FieldType::Date),
        FieldDescriptor::new("is_urgent", FieldType::Boolean),
        FieldDescriptor::new("feedback_rating", FieldType::Rating),
        FieldDescriptor::new("_assign", FieldType::Text),
    ])
}

fn value_for(operator: Operator, field_type: FieldType) -> BoxedStrategy<ConditionValue> {
    match operator {
        Operator::In | Operator::NotIn => prop::collection::vec("[a-z]{1,6}", 1..4)
            .prop_map(ConditionValue::List)
            .boxed(),
        Operator::Between => ("2024-0[1-9]-[12][0-9]", "2025-0[1-9]-[12][0-9]")
            .prop_map(|(from, to)| ConditionValue::range(from, to))
            .boxed(),
        Operator::Timespan => select(Timespan::tokens())
            .prop_map(|token| ConditionValue::parse_input(Operator::Timespan, &token))
            .boxed(),
        Operator::Is => select(Presence::tokens())
            .prop_map(|token| ConditionValue::parse_input(Operator::Is, &token))
            .boxed(),
        _ if field_type == FieldType::Boolean => select(vec!["Yes", "No"]).prop_map(ConditionValue::text).boxed(),
        _ => "[a-z][a-z0-9]{0,7}".prop_map(ConditionValue::Text).boxed(),
    }
}

/// A valid filter for `field`, using one of the operators its type offers
fn entry(field: FieldDescriptor) -> BoxedStrategy<(String, SimpleFilter)> {
    let operators = OperatorCatalog::default()
        .operators_for(field.field_type, &field.name)
        .to_vec();
    select(operators)
        .prop_flat_map(move |operator| {
            let name = field.name.clone();
            value_for(operator, field.field_type).prop_map(move |value| (name.clone(), SimpleFilter::new(operator, value)))
        })
        .boxed()
}

fn simple_map() -> impl Strategy<Value = SimpleFilterMap> {
    let fields: Vec<FieldDescriptor> = catalog().iter().cloned().collect();
    let count = fields.len();
    subsequence(fields, 0..=count)
        .prop_flat_map(|fields| fields.into_iter().map(entry).collect::<Vec<_>>())
        .prop_map(|entries| entries.into_iter().collect())
}

fn leaf() -> impl Strategy<Value = Node> {
    let fields: Vec<FieldDescriptor> = catalog().iter().cloned().collect();
    select(fields).prop_flat_map(|field| {
        let descriptor = field.clone();
        entry(field).prop_map(move |(_, filter)| {
            Node::Condition(Condition::new(descriptor.clone(), filter.operator, filter.value))
        })
    })
}

/// Nested tree paired with the number of leaves it was built from
fn tree() -> impl Strategy<Value = (Group, usize)> {
    let node = leaf().prop_map(|node| (node, 1usize)).prop_recursive(4, 48, 4, |inner| {
        (prop::collection::vec(inner, 1..4), any::<bool>()).prop_map(|(children, or)| {
            let leaves: usize = children.iter().map(|(_, n)| n).sum();
            let nodes = children.into_iter().map(|(node, _)| node).collect();
            let group = if or { Group::or(nodes) } else { Group::and(nodes) };
            (Node::Group(group), leaves)
        })
    });
    prop::collection::vec(node, 1..4).prop_map(|children| {
        let leaves: usize = children.iter().map(|(_, n)| n).sum();
        (Group::and(children.into_iter().map(|(node, _)| node).collect()), leaves)
    })
}

proptest! {
    #[test]
    fn simple_map_survives_the_tree(map in simple_map()) {
        let catalog = catalog();
        let settings = FilterSettings::default();
        let adapter = SimpleFilterAdapter::new(&catalog, &settings);
        prop_assert_eq!(adapter.to_map(&adapter.to_tree(&map)).unwrap(), map);
    }

    #[test]
    fn flat_and_tree_survives_the_wire(map in simple_map()) {
        let catalog = catalog();
        let settings = FilterSettings::default();
        let adapter = SimpleFilterAdapter::new(&catalog, &settings);
        let compiler = FilterCompiler::new(&catalog, &settings);
        let tree = adapter.to_tree(&map);

        let payload = compiler.compile(&tree, FilterMode::Simple).unwrap();
        let hydrated = compiler.hydrate(&payload).unwrap();
        prop_assert_eq!(hydrated.mode, FilterMode::Simple);
        prop_assert_eq!(&hydrated.tree, &tree);

        if !tree.is_empty() {
            let payload = compiler.compile(&tree, FilterMode::Advanced).unwrap();
            let hydrated = compiler.hydrate(&payload).unwrap();
            prop_assert_eq!(hydrated.mode, FilterMode::Advanced);
            prop_assert_eq!(&hydrated.tree, &tree);
        }
    }

    #[test]
    fn leaf_count_ignores_depth((tree, leaves) in tree()) {
        let catalog = catalog();
        let settings = FilterSettings::default();
        let compiler = FilterCompiler::new(&catalog, &settings);
        prop_assert_eq!(count_leaves(&tree), leaves);

        let payload = compiler.compile(&tree, FilterMode::Advanced).unwrap();
        let hydrated = compiler.hydrate(&payload).unwrap();
        prop_assert_eq!(count_leaves(&hydrated.tree), leaves);
    }
}
