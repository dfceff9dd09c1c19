//! Builtin resource kinds and provider schemas.
//!
//! The catalog covers the resource mix this tool provisions: compute
//! instances, storage buckets and pub/sub topics, all served by the `local`
//! provider.

use converge::{AttrType, KindSchema, ProviderSchema, SchemaRegistry};

/// Build the registry of builtin kinds and providers.
pub fn builtin_registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();

    registry.register_kind(
        KindSchema::new("compute_instance", "local")
            .required("machine_type", AttrType::String)
            .required("zone", AttrType::String)
            .required("image", AttrType::String)
            .optional("network", AttrType::String)
            .optional("tags", AttrType::List(Box::new(AttrType::String)))
            .optional("labels", AttrType::Map(Box::new(AttrType::String)))
            .optional("metadata", AttrType::Map(Box::new(AttrType::String)))
            .optional("boot_disk", AttrType::Any)
            .computed("id", AttrType::String)
            .computed("ip_address", AttrType::String),
    );

    registry.register_kind(
        KindSchema::new("storage_bucket", "local")
            .required("location", AttrType::String)
            .optional("storage_class", AttrType::String)
            .optional("versioning", AttrType::Bool)
            .optional("force_destroy", AttrType::Bool)
            .optional("labels", AttrType::Map(Box::new(AttrType::String)))
            .computed("id", AttrType::String)
            .computed("url", AttrType::String),
    );

    registry.register_kind(
        KindSchema::new("pubsub_topic", "local")
            .optional("message_retention", AttrType::String)
            .optional("labels", AttrType::Map(Box::new(AttrType::String)))
            .computed("id", AttrType::String),
    );

    registry.register_provider(
        ProviderSchema::new("local")
            .optional("root", AttrType::String)
            .optional("project", AttrType::String)
            .optional("region", AttrType::String),
    );

    registry
}
