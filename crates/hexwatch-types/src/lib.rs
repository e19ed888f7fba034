//! Shared type definitions for the Hexwatch world-state mirror.
//!
//! This crate is the single source of truth for the data that crosses a
//! process boundary: what the world source sends, and what the mirror
//! hands back to its readers. View types flow downstream to `TypeScript`
//! via `ts-rs` for the browser client.
//!
//! # Modules
//!
//! - [`ids`] -- Axial coordinates and room identifiers
//! - [`entities`] -- Bot, structure, resource, and terrain records
//! - [`protocol`] -- Request replies and the per-tick entities message
//! - [`views`] -- Projections served to readers

pub mod entities;
pub mod ids;
pub mod protocol;
pub mod views;

// Re-export all public types at crate root for convenience.
pub use entities::{
    Bot, Resource, ResourceKind, RoomPosition, SourceDiagnostics, Structure, StructureKind,
    TerrainKind, TerrainTile, WorldPosition,
};
pub use ids::{Axial, InvalidRoomId, RoomId};
pub use protocol::{
    EntitiesMessage, ErrorCode, Reply, RoomBots, RoomLayoutReply, RoomListReply, RoomPlacement,
    RoomResources, RoomStructures, TerrainReply,
};
pub use views::{RoomObjects, RoomObjectsView};

#[cfg(test)]
mod tests {
    //! Binding generation for the `TypeScript` client.

    #[test]
    fn export_bindings() {
        // Writing the bindings is a side effect of `export_all`; the
        // files land in `bindings/` relative to the crate root.
        use ts_rs::TS;

        let _ = crate::ids::Axial::export_all();
        let _ = crate::entities::Bot::export_all();
        let _ = crate::entities::Structure::export_all();
        let _ = crate::entities::Resource::export_all();
        let _ = crate::entities::TerrainTile::export_all();
        let _ = crate::entities::RoomPosition::export_all();
        let _ = crate::entities::SourceDiagnostics::export_all();
        let _ = crate::views::RoomObjectsView::export_all();
    }
}
