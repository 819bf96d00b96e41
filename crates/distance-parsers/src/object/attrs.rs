//! Fragment field forwarding
//!
//! Objects expose the fields of their components as their own accessors.
//! [`fragment_attrs!`](crate::fragment_attrs) declares a trait per component
//! tag whose getters and setters look the fragment up by tag and convert the
//! field to a Rust type:
//!
//! ```ignore
//! fragment_attrs! {
//!     /// Music trigger settings
//!     pub trait MusicTriggerAttrs: "MusicTrigger" {
//!         music_id / set_music_id: u32;
//!         one_time_trigger / set_one_time_trigger: bool;
//!     }
//! }
//!
//! let id = obj.music_id()?;
//! ```

use distance_core::Result;

use super::DstObject;
use crate::schema::{FromValue, IntoValue};

/// Something that holds fragments addressable by tag
pub trait FragmentHost {
    fn fragment_get<T: FromValue>(&self, tag: &str, field: &str) -> Result<T>;

    fn fragment_set<T: IntoValue>(&mut self, tag: &str, field: &str, value: T) -> Result<()>;
}

impl FragmentHost for DstObject {
    fn fragment_get<T: FromValue>(&self, tag: &str, field: &str) -> Result<T> {
        self.get(tag)?.get(field)
    }

    fn fragment_set<T: IntoValue>(&mut self, tag: &str, field: &str, value: T) -> Result<()> {
        self.get_mut(tag)?.set(field, value)
    }
}

/// Declare a trait forwarding typed accessors to one fragment's fields
#[macro_export]
macro_rules! fragment_attrs {
    ($(
        $(#[$meta:meta])*
        $vis:vis trait $name:ident : $tag:literal {
            $( $get:ident / $set:ident : $ty:ty; )*
        }
    )*) => {$(
        $(#[$meta])*
        $vis trait $name: $crate::object::FragmentHost {
            /// Tag of the fragment these accessors read
            const TAG: &'static str = $tag;

            $(
                fn $get(&self) -> ::distance_core::Result<$ty> {
                    self.fragment_get($tag, stringify!($get))
                }

                fn $set(&mut self, value: $ty) -> ::distance_core::Result<()> {
                    self.fragment_set($tag, stringify!($get), value)
                }
            )*
        }

        impl $name for $crate::object::DstObject {}
    )*};
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::registry::Registry;

    crate::fragment_attrs! {
        trait NameAttrs: "CustomName" {
            custom_name / set_custom_name: String;
        }
    }

    #[test]
    fn test_forwarding() {
        let registry = Arc::new(Registry::eager().unwrap());
        let mut obj = registry.create_object("Group").unwrap();
        assert_eq!(obj.custom_name().unwrap(), "");
        obj.set_custom_name("two".into()).unwrap();
        assert_eq!(obj.custom_name().unwrap(), "two");
        assert_eq!(<crate::object::DstObject as NameAttrs>::TAG, "CustomName");
    }

    #[test]
    fn test_missing_fragment() {
        let registry = Arc::new(Registry::eager().unwrap());
        let obj = crate::object::DstObject::new(registry, &crate::object::GENERIC, "Bare");
        let err = obj.custom_name().unwrap_err();
        assert_eq!(err.fragment_is_present(), Some(false));
    }
}
