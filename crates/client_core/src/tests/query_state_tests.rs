use super::*;

fn filtered(action: QueryAction) -> QueryState {
    QueryState {
        page: 4,
        ..QueryState::default()
    }
    .apply(action)
}

#[test]
fn empty_query_yields_defaults() {
    let state = QueryState::from_query("");
    assert_eq!(state, QueryState::default());
    assert_eq!(state.page, 1);
    assert_eq!(state.page_size, 20);
    assert_eq!(state.sort_field, "name");
    assert_eq!(state.sort_direction, SortDirection::Asc);
    assert!(!state.low_stock());
    assert_eq!(state.to_query(), "");
}

#[test]
fn parses_recognized_keys_and_ignores_the_rest() {
    let state = QueryState::from_query(
        "?search=drill+bit&category=Tools&location=Warehouse%20A&status=active&lowStock=true&page=3&sort=sku&order=desc&utm_source=mail",
    );
    assert_eq!(state.search, "drill bit");
    assert_eq!(state.filter(FilterKey::Category), Some("Tools"));
    assert_eq!(state.filter(FilterKey::Location), Some("Warehouse A"));
    assert_eq!(state.filter(FilterKey::Status), Some("active"));
    assert!(state.low_stock());
    assert_eq!(state.page, 3);
    assert_eq!(state.sort_field, "sku");
    assert_eq!(state.sort_direction, SortDirection::Desc);
    assert_eq!(state.filters.len(), 4);
}

#[test]
fn malformed_values_fall_back_to_defaults() {
    let state = QueryState::from_query("page=abc&order=sideways&lowStock=yes&category=&sort=");
    assert_eq!(state, QueryState::default());

    assert_eq!(QueryState::from_query("page=0").page, 1);
    assert_eq!(QueryState::from_query("page=-2").page, 1);
}

#[test]
fn to_query_emits_only_non_default_fields() {
    let state = QueryState::default()
        .apply(QueryAction::SetFilter(
            FilterKey::Category,
            Some("Tools".to_string()),
        ))
        .apply(QueryAction::SortBy("name".to_string()))
        .apply(QueryAction::SetPage(2));
    assert_eq!(state.to_query(), "category=Tools&page=2&order=desc");
}

#[test]
fn search_and_filter_changes_reset_page() {
    assert_eq!(filtered(QueryAction::SetSearch("bolt".into())).page, 1);
    assert_eq!(
        filtered(QueryAction::SetFilter(
            FilterKey::Location,
            Some("Site 1".into())
        ))
        .page,
        1
    );
    assert_eq!(
        filtered(QueryAction::SetFilter(FilterKey::Status, None)).page,
        1
    );
    assert_eq!(filtered(QueryAction::SetLowStock(true)).page, 1);
    assert_eq!(filtered(QueryAction::ClearFilters).page, 1);
}

#[test]
fn sorting_keeps_page_and_toggles_direction() {
    let state = filtered(QueryAction::SortBy("name".into()));
    assert_eq!(state.page, 4);
    assert_eq!(state.sort_direction, SortDirection::Desc);

    let state = state.apply(QueryAction::SortBy("name".into()));
    assert_eq!(state.sort_direction, SortDirection::Asc);

    let state = state
        .apply(QueryAction::SortBy("name".into()))
        .apply(QueryAction::SortBy("current_stock".into()));
    assert_eq!(state.sort_field, "current_stock");
    assert_eq!(state.sort_direction, SortDirection::Asc);
    assert_eq!(state.page, 4);
    assert_eq!(state.ordering(), "current_stock");
    assert_eq!(
        state.apply(QueryAction::SortBy("current_stock".into())).ordering(),
        "-current_stock"
    );
}

#[test]
fn empty_filter_value_removes_key() {
    let state = QueryState::default()
        .apply(QueryAction::SetFilter(
            FilterKey::Category,
            Some("Safety".into()),
        ))
        .apply(QueryAction::SetFilter(FilterKey::Category, Some(String::new())));
    assert!(state.filters.is_empty());
}

#[test]
fn low_stock_through_generic_filter_action() {
    let on = QueryState::default().apply(QueryAction::SetFilter(
        FilterKey::LowStock,
        Some("true".into()),
    ));
    assert!(on.low_stock());
    assert_eq!(on.to_query(), "lowStock=true");

    let off = on.apply(QueryAction::SetFilter(
        FilterKey::LowStock,
        Some("false".into()),
    ));
    assert!(!off.low_stock());
}

#[test]
fn previous_page_never_goes_below_one() {
    let state = QueryState::default()
        .apply(QueryAction::PreviousPage)
        .apply(QueryAction::SetPage(0));
    assert_eq!(state.page, 1);
    assert_eq!(state.apply(QueryAction::NextPage).page, 2);
}

#[test]
fn next_page_stops_at_last_loaded_page() {
    let last = QueryState::default().apply_within(QueryAction::NextPage, Some(1));
    assert_eq!(last.page, 1);
    assert_eq!(last.to_query(), "");

    let jumped = QueryState::default().apply_within(QueryAction::SetPage(9), Some(3));
    assert_eq!(jumped.page, 3);
    let empty = QueryState::default().apply_within(QueryAction::NextPage, Some(0));
    assert_eq!(empty.page, 1);

    let unknown = QueryState::default().apply_within(QueryAction::NextPage, None);
    assert_eq!(unknown.page, 2);
    let previous = QueryState::default()
        .apply(QueryAction::SetPage(3))
        .apply_within(QueryAction::PreviousPage, Some(1));
    assert_eq!(previous.page, 2);
}

#[test]
fn concurrent_dispatches_are_not_lost() {
    let sync = QueryStateSync::new(QueryState::default());
    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..50 {
                    sync.dispatch(QueryAction::NextPage);
                }
            });
        }
    });
    assert_eq!(sync.current().page, 1 + 8 * 50);
}

fn sample_actions() -> Vec<QueryAction> {
    vec![
        QueryAction::SetSearch("safety helmet".into()),
        QueryAction::SetSearch("a&b=c%".into()),
        QueryAction::SetSearch(String::new()),
        QueryAction::SetFilter(FilterKey::Category, Some("Tools".into())),
        QueryAction::SetFilter(FilterKey::Location, Some("Warehouse B".into())),
        QueryAction::SetFilter(FilterKey::Status, Some("low+stock".into())),
        QueryAction::SetFilter(FilterKey::Category, None),
        QueryAction::SetLowStock(true),
        QueryAction::SetLowStock(false),
        QueryAction::ClearFilters,
        QueryAction::SortBy("name".into()),
        QueryAction::SortBy("unit_price".into()),
        QueryAction::SetPage(7),
        QueryAction::NextPage,
        QueryAction::PreviousPage,
        QueryAction::SetPageSize(50),
    ]
}

#[test]
fn url_round_trip_holds_for_reachable_states() {
    let actions = sample_actions();
    let mut frontier = vec![QueryState::default()];
    let mut checked = 0;

    for _depth in 0..3 {
        let mut next = Vec::new();
        for state in &frontier {
            for action in &actions {
                let reached = state.clone().apply(action.clone());
                let query = reached.to_query();
                assert_eq!(
                    QueryState::from_query(&query),
                    reached,
                    "round trip failed for query '{query}'"
                );
                checked += 1;
                next.push(reached);
            }
        }
        next.dedup();
        frontier = next;
    }

    assert!(checked > 1000);
}

#[test]
fn result_changing_actions_always_land_on_page_one() {
    let mut state = QueryState::default().apply(QueryAction::SetPage(9));
    for action in sample_actions() {
        let changes_results = matches!(
            action,
            QueryAction::SetSearch(_)
                | QueryAction::SetFilter(..)
                | QueryAction::SetLowStock(_)
                | QueryAction::ClearFilters
        );
        state = state.apply(QueryAction::SetPage(9)).apply(action);
        if changes_results {
            assert_eq!(state.page, 1);
        }
    }
}

#[tokio::test]
async fn sync_notifies_only_on_change() {
    let sync = QueryStateSync::from_query("category=Tools&page=3");
    let mut rx = sync.subscribe();
    assert_eq!(sync.current().page, 3);

    sync.dispatch(QueryAction::SetSearch("drill".into()));
    assert!(rx.has_changed().expect("sender alive"));
    assert_eq!(rx.borrow_and_update().page, 1);
    assert_eq!(sync.current_query(), "search=drill&category=Tools");

    sync.dispatch(QueryAction::SetSearch("drill".into()));
    assert!(!rx.has_changed().expect("sender alive"));

    sync.replace_from_query("status=active");
    assert!(rx.has_changed().expect("sender alive"));
    assert_eq!(
        rx.borrow_and_update().filter(FilterKey::Status),
        Some("active")
    );
}
