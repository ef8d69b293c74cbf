/// Common constants used across the ingestion pipeline.
///
/// These defaults are used for command line arguments and
/// configuration when explicit values are not provided.
pub const DEFAULT_IDENTIFIER_WIDTH: usize = 8;
pub const DEFAULT_TRANSFORM_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_REINGEST_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_TRANSFORM_EXECUTABLE: &str = "./datadic_process";

/// Derived files written next to the repaired records. Loaders and the
/// path flattener must never treat them as records.
pub const CLASS_LINK_FILE: &str = "class-link.json";
pub const COLLECTION_ENTITIES_FILE: &str = "collection-entities.json";
pub const RESERVED_FILES: [&str; 2] = [CLASS_LINK_FILE, COLLECTION_ENTITIES_FILE];

/// Subdirectory of an output tree holding path-value documents.
pub const PATH_VAL_DIR: &str = "path_val";

/// Identity fields.
pub const ENTITY_FIELD: &str = "Entity";
pub const REF_NAME_FIELD: &str = "RefName";
pub const CLASS_LINKAGE_REF: &str = "ClassLinkage";
pub const COLLECTION_ENTITIES_REF: &str = "CollectionEntities";

/// Replaces literal dots inside flattened paths; the store uses dots as its
/// own field-path separator.
pub const DOT_SENTINEL: &str = "[dot]";

/// Joins the superclass chain into one `Branch` string.
pub const BRANCH_SEPARATOR: &str = "--";

/// Logical store collections.
pub mod collections {
    pub const ENTITIES: &str = "entities";
    pub const COLLECTIONS: &str = "collections";
    pub const PATH_VALUES: &str = "pathval";
    pub const CLASS_LINKAGE: &str = "class";
    pub const COLLECTION_ENTITIES: &str = "colentities";
    pub const ENTITIES_TEXT: &str = "entities_text";
    pub const ENTITIES_HTML: &str = "entities_html";
    pub const COLLECTIONS_TEXT: &str = "collections_text";
    pub const COLLECTIONS_HTML: &str = "collections_html";

    /// Everything a clearing run drops before reloading.
    pub const DERIVED_AND_CANONICAL: [&str; 5] = [
        PATH_VALUES,
        CLASS_LINKAGE,
        COLLECTION_ENTITIES,
        COLLECTIONS,
        ENTITIES,
    ];
}

/// Accepted `Metadata.Type` values per record kind.
pub const ENTITY_TYPES: [&str; 3] = ["Element", "Object", "Abstract Element"];
pub const COLLECTION_TYPES: [&str; 1] = ["Collection"];
