use reducible_macros::Action;

#[derive(Action, Debug)]
enum RowAction<Id: Clone> {
    Row(Id),
    Removed,
}

#[derive(Action)]
enum Single {
    Only(u8),
}

fn main() {
    let action = RowAction::Row(7u32);
    assert!(action.is_row());
    assert_eq!(action.as_row(), Some(&7));
    assert_eq!(action.into_row(), Some(7));
    assert!(RowAction::<u32>::Removed.is_removed());

    assert_eq!(Single::Only(1).into_only(), Some(1));
    assert_eq!(Single::Only(1).variant_name(), "Only");
}
