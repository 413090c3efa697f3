// Cached provider binding with invalidate-and-rebuild semantics

use super::BindingError;
use crate::remote::{ClassHandle, MethodId, RemoteService, interface};

/// Fully resolved binding. Only ever constructed whole.
#[derive(Debug)]
pub struct RemoteBinding {
    class: ClassHandle,
    pub(crate) update: MethodId,
    pub(crate) insert: MethodId,
    pub(crate) query: MethodId,
}

impl RemoteBinding {
    async fn resolve<S: RemoteService + ?Sized>(service: &S) -> Result<Self, BindingError> {
        let local = service
            .find_class(interface::CLIENT_CLASS)
            .await
            .map_err(|e| BindingError::new(interface::CLIENT_CLASS, e))?;
        let class = service
            .pin_class(local)
            .await
            .map_err(|e| BindingError::new(interface::CLIENT_CLASS, e))?;

        let methods = async {
            let mut ids = [MethodId(0); 3];
            for (slot, name) in ids
                .iter_mut()
                .zip([interface::UPDATE, interface::INSERT, interface::QUERY])
            {
                *slot = service
                    .method_id(&class, name)
                    .await
                    .map_err(|e| BindingError::new(name, e))?;
            }
            Ok::<_, BindingError>(ids)
        }
        .await;

        match methods {
            Ok([update, insert, query]) => Ok(RemoteBinding {
                class,
                update,
                insert,
                query,
            }),
            Err(e) => {
                if let Err(release) = service.release_class(class).await {
                    tracing::warn!(error = %release, "failed to release class after partial bind");
                }
                Err(e)
            }
        }
    }
}

/// Engine-owned cache of the provider binding.
#[derive(Debug, Default)]
pub struct RemoteHandleCache {
    binding: Option<RemoteBinding>,
}

impl RemoteHandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.binding.is_some()
    }

    /// Resolves the binding unless it is already cached. On failure the cache
    /// stays empty.
    pub async fn ensure<S: RemoteService + ?Sized>(
        &mut self,
        service: &S,
    ) -> Result<&RemoteBinding, BindingError> {
        let binding = match self.binding.take() {
            Some(b) => b,
            None => {
                let b = RemoteBinding::resolve(service).await?;
                tracing::debug!("resolved provider binding");
                b
            }
        };
        Ok(self.binding.insert(binding))
    }

    /// Drops the binding and releases its pinned class. No-op when empty.
    pub async fn invalidate<S: RemoteService + ?Sized>(&mut self, service: &S) {
        let Some(binding) = self.binding.take() else {
            return;
        };
        if let Err(e) = service.release_class(binding.class).await {
            tracing::warn!(error = %e, "failed to release pinned class handle");
        }
        tracing::debug!("invalidated provider binding");
    }
}
