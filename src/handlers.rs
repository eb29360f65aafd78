//! Routes component interactions to the handler that created the component.
//!
//! Handlers are registered once at startup under their owner name. Components they create carry
//! that name in their [`ComponentId`], so an incoming token can be resolved and handed back to
//! the right handler with its arguments.

use crate::{
    component_id::{ComponentId, Lifespan},
    error::StoreError,
    serializer::FormatError,
    store::ComponentIdStore,
    text, Error,
};
use std::collections::HashMap;

/// What a handler receives when one of its components is used
pub struct ComponentInteraction<'a> {
    pub token: &'a str,
    pub component_id: &'a ComponentId,
}

impl ComponentInteraction<'_> {
    pub fn elements(&self) -> &[String] {
        self.component_id.elements()
    }
}

struct ComponentHandler {
    /// Short sentence describing which components the handler owns
    description: &'static str,
    action: Box<dyn Fn(&ComponentInteraction<'_>) -> Result<(), Error> + Send + Sync>,
}

/// Outcome of routing one interaction
#[derive(Debug, PartialEq, Eq)]
pub enum Routed {
    Handled,
    /// The token was valid but its record is gone
    Expired,
    /// Not a token we could have issued, or its payload is corrupted
    Invalid(FormatError),
    /// Resolved fine, but no handler is registered under the owner name anymore
    UnknownOwner(String),
}

impl Routed {
    /// Message to show the user when the interaction couldn't be handled
    pub fn response_text(&self) -> Option<&'static str> {
        match self {
            Routed::Handled => None,
            Routed::Expired => Some(text::EXPIRED_COMPONENT),
            Routed::Invalid(_) | Routed::UnknownOwner(_) => Some(text::UNUSABLE_COMPONENT),
        }
    }
}

#[derive(Default)]
pub struct Handlers {
    handlers: HashMap<&'static str, ComponentHandler>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        owner: &'static str,
        description: &'static str,
        action: impl Fn(&ComponentInteraction<'_>) -> Result<(), Error> + Send + Sync + 'static,
    ) -> Result<(), Error> {
        if self.handlers.contains_key(owner) {
            return Err(format!("Component handler `{}` registered twice", owner).into());
        }
        self.handlers.insert(
            owner,
            ComponentHandler {
                description,
                action: Box::new(action),
            },
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered owner names with their descriptions
    pub fn describe(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.handlers
            .iter()
            .map(|(&owner, handler)| (owner, handler.description))
    }

    /// Creates a component id for a registered handler and returns its token
    pub async fn component_id(
        &self,
        store: &ComponentIdStore,
        owner: &str,
        elements: Vec<String>,
        lifespan: Lifespan,
    ) -> Result<String, Error> {
        if !self.handlers.contains_key(owner) {
            return Err(format!("No component handler named `{}`", owner).into());
        }
        Ok(store
            .generate(ComponentId::new(owner, elements), lifespan)
            .await?)
    }

    /// Resolves `token` and runs the owning handler. Errors from the handler itself and
    /// database failures are returned as `Err`.
    pub async fn route(&self, store: &ComponentIdStore, token: &str) -> Result<Routed, Error> {
        let component_id = match store.parse(token).await {
            Ok(Some(component_id)) => component_id,
            Ok(None) => {
                log::debug!("Component id {} has expired", token);
                return Ok(Routed::Expired);
            }
            Err(StoreError::Format(e)) => {
                log::warn!("Dropping interaction with unusable component id {:?}: {}", token, e);
                return Ok(Routed::Invalid(e));
            }
            Err(e) => return Err(e.into()),
        };

        let handler = match self.handlers.get(component_id.owner()) {
            Some(handler) => handler,
            None => {
                log::warn!(
                    "Component id {} belongs to unknown handler `{}`",
                    token,
                    component_id.owner()
                );
                return Ok(Routed::UnknownOwner(component_id.owner().to_owned()));
            }
        };

        (handler.action)(&ComponentInteraction {
            token,
            component_id: &component_id,
        })?;
        Ok(Routed::Handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ComponentIdStoreConfig, db::tests::memory_pool};
    use std::sync::{Arc, Mutex};

    async fn store() -> Arc<ComponentIdStore> {
        ComponentIdStore::new(memory_pool().await, ComponentIdStoreConfig::default())
    }

    #[tokio::test]
    async fn routes_to_owner_with_arguments() {
        let store = store().await;
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut handlers = Handlers::new();
        {
            let seen = seen.clone();
            handlers
                .add("tag", "Tag pagination buttons", move |interaction| {
                    seen.lock().unwrap().push(interaction.elements().to_vec());
                    Ok(())
                })
                .unwrap();
        }
        handlers
            .add("reminder", "Reminder snooze buttons", |_| Err("snooze failed".into()))
            .unwrap();

        let token = handlers
            .component_id(&store, "tag", vec!["foo".into(), "2".into()], Lifespan::Regular)
            .await
            .unwrap();
        assert_eq!(handlers.route(&store, &token).await.unwrap(), Routed::Handled);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![vec!["foo".to_owned(), "2".to_owned()]]
        );

        let token = handlers
            .component_id(&store, "reminder", Vec::new(), Lifespan::Permanent)
            .await
            .unwrap();
        assert!(handlers.route(&store, &token).await.is_err());
    }

    #[tokio::test]
    async fn expired_invalid_and_orphaned_tokens() {
        let store = store().await;
        let handlers = Handlers::new();

        let expired = uuid::Uuid::new_v4().to_string();
        let routed = handlers.route(&store, &expired).await.unwrap();
        assert_eq!(routed, Routed::Expired);
        assert_eq!(routed.response_text(), Some(text::EXPIRED_COMPONENT));

        let routed = handlers.route(&store, "garbage").await.unwrap();
        assert!(matches!(routed, Routed::Invalid(_)));
        assert_eq!(routed.response_text(), Some(text::UNUSABLE_COMPONENT));

        let orphan = store
            .generate(ComponentId::new("removed", Vec::new()), Lifespan::Regular)
            .await
            .unwrap();
        assert_eq!(
            handlers.route(&store, &orphan).await.unwrap(),
            Routed::UnknownOwner("removed".into())
        );
    }

    #[tokio::test]
    async fn owners_must_be_registered() {
        let store = store().await;
        let mut handlers = Handlers::new();
        handlers.add("tag", "Tags", |_| Ok(())).unwrap();

        assert!(handlers.add("tag", "Tags again", |_| Ok(())).is_err());
        assert_eq!(handlers.describe().collect::<Vec<_>>(), vec![("tag", "Tags")]);
        assert!(handlers
            .component_id(&store, "ban", Vec::new(), Lifespan::Regular)
            .await
            .is_err());
    }
}
