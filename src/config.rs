/// Options applied to a registration.
/// ## Fields
/// - `singleton`:
///   If `true`, the value is produced once on first resolution, cached and reused.
///   Otherwise it is produced again on every resolution.
/// - `auto_new`:
///   If `true`, a registered [`crate::Class`] is constructed and a registered [`crate::Factory`] is invoked.
///   Otherwise the class descriptor or the factory itself is the resolved value.
/// - `register_in_superclasses`:
///   If `true`, the registration is also appended to the sub-registrations of every ancestor of the class,
///   so it can be collected with [`crate::Registry::get_sub_classes`].
///
///   This flag isn't inherited by the ancestors registered on the way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub singleton: bool,
    pub auto_new: bool,
    pub register_in_superclasses: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            singleton: true,
            auto_new: true,
            register_in_superclasses: false,
        }
    }
}

impl Config {
    /// Default options, except the value is produced on every resolution.
    #[inline]
    #[must_use]
    pub const fn transient() -> Self {
        Self {
            singleton: false,
            auto_new: true,
            register_in_superclasses: false,
        }
    }

    #[inline]
    #[must_use]
    pub const fn with_singleton(mut self, singleton: bool) -> Self {
        self.singleton = singleton;
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_auto_new(mut self, auto_new: bool) -> Self {
        self.auto_new = auto_new;
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_register_in_superclasses(mut self, register_in_superclasses: bool) -> Self {
        self.register_in_superclasses = register_in_superclasses;
        self
    }

    #[inline]
    #[must_use]
    pub(crate) const fn propagated(self) -> Self {
        self.with_register_in_superclasses(false)
    }
}
