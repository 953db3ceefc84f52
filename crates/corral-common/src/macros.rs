/// Macro to implement the collection plumbing for a `Vec` newtype.
///
/// Eliminates boilerplate for the common pattern of a named, ordered
/// collection that should behave like the `Vec` it wraps:
/// ```ignore
/// pub struct Members(Vec<Member>);
///
/// impl std::ops::Deref for Members {
///     type Target = Vec<Member>;
///     fn deref(&self) -> &Vec<Member> { &self.0 }
/// }
/// ```
///
/// # Usage
/// ```
/// use corral_common::impl_vec_newtype;
///
/// #[derive(Debug, Default)]
/// pub struct Names(Vec<String>);
///
/// impl_vec_newtype!(Names, String);
///
/// let names: Names = vec!["a".to_string()].into();
/// assert_eq!(names.len(), 1);
/// assert_eq!(names.iter().count(), 1);
/// ```
#[macro_export]
macro_rules! impl_vec_newtype {
    ($name:ident, $item:ty) => {
        impl $name {
            pub fn new() -> Self {
                Self(::std::vec::Vec::new())
            }

            pub fn into_inner(self) -> ::std::vec::Vec<$item> {
                self.0
            }
        }

        impl ::std::ops::Deref for $name {
            type Target = ::std::vec::Vec<$item>;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl ::std::ops::DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.0
            }
        }

        impl ::std::convert::From<::std::vec::Vec<$item>> for $name {
            fn from(items: ::std::vec::Vec<$item>) -> Self {
                Self(items)
            }
        }

        impl ::std::iter::FromIterator<$item> for $name {
            fn from_iter<I: ::std::iter::IntoIterator<Item = $item>>(iter: I) -> Self {
                Self(iter.into_iter().collect())
            }
        }

        impl ::std::iter::IntoIterator for $name {
            type Item = $item;
            type IntoIter = ::std::vec::IntoIter<$item>;

            fn into_iter(self) -> Self::IntoIter {
                self.0.into_iter()
            }
        }

        impl<'a> ::std::iter::IntoIterator for &'a $name {
            type Item = &'a $item;
            type IntoIter = ::std::slice::Iter<'a, $item>;

            fn into_iter(self) -> Self::IntoIter {
                self.0.iter()
            }
        }
    };
}
