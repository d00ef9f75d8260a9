use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named snapshot of a table's configuration state.
///
/// A view stores membership, not copies: it remembers which filter, sort
/// order, and hidden-column records should be active, and switching to the
/// view re-activates exactly that set. Every table keeps one default view
/// that is created with it and can never be renamed, overwritten, or
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub id: Uuid,
    pub table_id: Uuid,
    pub name: String,
    pub is_default: bool,
}

/// The membership snapshot a view captures: the ids of the configuration
/// records that become active when the view is switched to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewConfig {
    pub filter_ids: Vec<Uuid>,
    pub sort_order_ids: Vec<Uuid>,
    pub hidden_column_ids: Vec<Uuid>,
}

impl ViewConfig {
    pub fn is_empty(&self) -> bool {
        self.filter_ids.is_empty()
            && self.sort_order_ids.is_empty()
            && self.hidden_column_ids.is_empty()
    }
}
