//! Fenix message catalog.
//!
//! Every shape the client can send or receive, declared once as a struct plus
//! its wire name and wire field names. [`Outgoing::register_all`] and
//! [`Incoming::register_all`] load these tables into the two registries.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::protocol::registry::{decode_shape, encode_shape, Fields, Record, Shape, TypeRegistry};
use crate::{Error, Result};

/// Declare a direction's catalog.
///
/// Generates one struct per shape (fields renamed to their wire names), the
/// [`Shape`] impl, the direction enum with a `From` impl per shape, its
/// [`Record`] impl, and `register_all`.
macro_rules! catalog {
    (
        $(#[$enum_meta:meta])*
        pub enum $catalog:ident {
            $(
                $(#[$shape_meta:meta])*
                $wire:literal => $shape:ident {
                    $( $field:ident : $ty:ty = $field_wire:literal ),* $(,)?
                }
            )*
        }
    ) => {
        $(
            $(#[$shape_meta])*
            #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
            pub struct $shape {
                $(
                    #[serde(rename = $field_wire)]
                    pub $field: $ty,
                )*
            }

            impl Shape for $shape {
                const TYPE_NAME: &'static str = $wire;
                const FIELDS: &'static [&'static str] = &[$($field_wire),*];
            }

            impl From<$shape> for $catalog {
                fn from(shape: $shape) -> Self {
                    $catalog::$shape(shape)
                }
            }
        )*

        $(#[$enum_meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub enum $catalog {
            $( $shape($shape), )*
        }

        impl Record for $catalog {
            fn type_name(&self) -> &'static str {
                match self {
                    $( $catalog::$shape(_) => $wire, )*
                }
            }
        }

        impl $catalog {
            /// Load every shape of this catalog into `registry`.
            ///
            /// # Errors
            ///
            /// Returns [`Error::DuplicateType`] if a name is already present.
            pub fn register_all(registry: &mut TypeRegistry<$catalog>) -> Result<()> {
                // ---
                $(
                    registry.register(
                        $wire,
                        |fields: Fields| Ok($catalog::$shape(decode_shape::<$shape>(fields)?)),
                        |record: &$catalog| match record {
                            $catalog::$shape(shape) => encode_shape(shape),
                            #[allow(unreachable_patterns)]
                            other => Err(Error::UnknownType(other.type_name().to_string())),
                        },
                    )?;
                )*
                Ok(())
            }

            /// A registry holding exactly this catalog.
            ///
            /// # Errors
            ///
            /// Returns [`Error::DuplicateType`] if the catalog declares a name twice.
            pub fn registry() -> Result<TypeRegistry<$catalog>> {
                // ---
                let mut registry = TypeRegistry::new();
                Self::register_all(&mut registry)?;
                Ok(registry)
            }
        }
    };
}

catalog! {
    /// Client-to-server messages.
    pub enum Outgoing {
        /// Log into an existing account.
        "signIn" => SignIn {
            email: String = "email",
            password: String = "password",
        }

        /// Create an account.
        "signUp" => SignUp {
            email: String = "email",
            username: String = "username",
            password: String = "password",
        }

        "createChannel" => CreateChannel {
            server_id: i64 = "serverID",
            name: String = "name",
        }

        "sendMessage" => SendMessage {
            channel_id: i64 = "channelID",
            contents: String = "contents",
        }

        "editMessage" => EditMessage {
            message_id: i64 = "messageID",
            contents: String = "contents",
        }

        "deleteMessage" => DeleteMessage {
            message_id: i64 = "messageID",
        }

        "addReaction" => AddReaction {
            message_id: i64 = "messageID",
            reaction: String = "reaction",
        }

        "removeReaction" => RemoveReaction {
            message_id: i64 = "messageID",
            reaction: i64 = "reaction",
        }

        "changeServerPermission" => ChangeServerPermission {
            permission: String = "permission",
            value: bool = "value",
            user_id: i64 = "userID",
            server_id: i64 = "serverID",
            actor: i64 = "actor",
        }

        // The lower-case `c` is what the server expects.
        "changechannelPermission" => ChangeChannelPermission {
            permission: String = "permission",
            value: bool = "value",
            user_id: i64 = "userID",
            channel_id: i64 = "channelID",
            actor: i64 = "actor",
        }

        "getPerms" => GetPerms {
            user_id: i64 = "userID",
            server_id: i64 = "serverID",
        }

        "getPermsList" => GetPermsList {
            user_id: i64 = "userID",
            server_id: i64 = "serverID",
        }

        "hasChannelPermission" => HasChannelPermission {
            permission: String = "permission",
            user_id: i64 = "userID",
            channel_id: i64 = "channelID",
        }

        "hasServerPermission" => HasServerPermission {
            permission: String = "permission",
            user_id: i64 = "userID",
            channel_id: i64 = "channelID",
        }

        "getRoles" => GetRoles {
            user_id: i64 = "userID",
            server_id: i64 = "serverID",
        }

        "getRolesList" => GetRolesList {
            user_id: i64 = "userID",
            server_id: i64 = "serverID",
        }

        "joinRoles" => JoinRoles {
            user_id: i64 = "userID",
            server_id: i64 = "serverID",
            role_id: i64 = "roleID",
            actor: i64 = "actor",
        }

        "createServer" => CreateServer {
            user_id: i64 = "userID",
            name: String = "name",
        }

        "getServer" => GetServer {
            server_id: i64 = "serverID",
        }

        "getServers" => GetServers {
            server_id: i64 = "serverID",
        }

        "getServersList" => GetServersList {
            server_id: i64 = "serverID",
        }
    }
}

catalog! {
    /// Server-to-client messages.
    pub enum Incoming {
        /// Authenticated account, sent in reply to `signIn` and `signUp`.
        ///
        /// The server puts the account id in `id`, the same key that carries
        /// the correlation id, so it is read as the correlation id and never
        /// reaches this shape.
        "authUser" => AuthUser {
            username: String = "username",
            email: String = "email",
            settings: HashMap<String, Value> = "settings",
            token: String = "token",
            username_hash: i64 = "usernameHash",
            created_at: DateTime<Utc> = "createdAt",
            verified: bool = "verified",
            servers: HashMap<String, HashMap<String, String>> = "servers",
        }

        /// Chat message pushed to every member of a channel.
        "message" => ChatMessage {
            message_id: i64 = "messageID",
            channel_id: i64 = "channelID",
            author_id: i64 = "authorID",
            contents: String = "contents",
        }
    }
}

impl Incoming {
    /// The account record, if this is an `authUser` reply.
    pub fn into_auth_user(self) -> Option<AuthUser> {
        match self {
            Incoming::AuthUser(user) => Some(user),
            _ => None,
        }
    }

    /// The chat message, if this is a `message` push.
    pub fn as_chat_message(&self) -> Option<&ChatMessage> {
        match self {
            Incoming::ChatMessage(message) => Some(message),
            _ => None,
        }
    }
}
