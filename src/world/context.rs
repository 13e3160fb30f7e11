use crate::entities::character::{Allegiance, CharacterRef, Hostility};
use std::sync::Arc;

/// Hostility and visibility decisions owned by the combat layer.
pub trait Targeting: Send + Sync {
    fn is_hostile_towards(&self, actor: CharacterRef<'_>, target: CharacterRef<'_>) -> bool;

    fn is_visible_to(
        &self,
        observer: CharacterRef<'_>,
        target: CharacterRef<'_>,
        use_sight: bool,
    ) -> bool;
}

/// Everything-visible targeting with allegiance-based hostility, used by the
/// headless driver when no combat layer is plugged in.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenTargeting;

impl Targeting for OpenTargeting {
    fn is_hostile_towards(&self, actor: CharacterRef<'_>, target: CharacterRef<'_>) -> bool {
        if actor.id() == target.id() {
            return false;
        }
        match (actor.hostility(), target.hostility()) {
            (Some(Hostility::Never), _) | (_, Some(Hostility::Never)) => false,
            (Some(Hostility::Always), _) | (_, Some(Hostility::Always)) => true,
            (None, None) => false,
            _ => {
                let actor = actor.core().allegiance;
                let target = target.core().allegiance;
                actor == Allegiance::Enemy || target == Allegiance::Enemy
            }
        }
    }

    fn is_visible_to(&self, _: CharacterRef<'_>, _: CharacterRef<'_>, _: bool) -> bool {
        true
    }
}

/// Capabilities a map reaches for while answering queries.
#[derive(Clone)]
pub struct MapContext {
    pub targeting: Arc<dyn Targeting>,
}

impl MapContext {
    pub fn new(targeting: Arc<dyn Targeting>) -> Self {
        Self { targeting }
    }
}

impl Default for MapContext {
    fn default() -> Self {
        Self::new(Arc::new(OpenTargeting))
    }
}

impl std::fmt::Debug for MapContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapContext").finish_non_exhaustive()
    }
}
