use once_cell::sync::OnceCell;

use crate::Container;

static DEFAULT: OnceCell<Container> = OnceCell::new();

/// Makes `container` the default one, unless a default is already set.
pub(crate) fn set_default(container: &Container) -> bool {
    DEFAULT.set(container.clone()).is_ok()
}

/// The first container built in the process, `None` before any container is built.
///
/// The default container lives until the process exits.
#[inline]
#[must_use]
pub fn default_container() -> Option<Container> {
    DEFAULT.get().cloned()
}
