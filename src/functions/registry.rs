use serde::de::DeserializeOwned;
use serde::Serialize;

/// A named callable Function together with its request and response shapes.
///
/// Implementations are normally generated by [`operation_registry!`](crate::operation_registry)
/// so the name and both shapes are declared in one place and shared by the caller and the
/// handler side.
pub trait Operation: Send + Sync + 'static {
    /// Name the backend exposes the Function under.
    const NAME: &'static str;

    type Input: Serialize + DeserializeOwned + Send + Sync + 'static;
    type Output: Serialize + DeserializeOwned + Send + 'static;
}

/// A closed set of operations that a [`TypedCaller`](crate::functions::TypedCaller) may invoke.
pub trait Registry: Send + Sync + 'static {
    /// Names of every registered operation, in declaration order.
    const OPERATIONS: &'static [&'static str];

    fn contains(name: &str) -> bool
    where
        Self: Sized,
    {
        Self::OPERATIONS.contains(&name)
    }
}

/// Marks `Op` as a member of the registry. Calls to operations outside the
/// registry fail to type-check.
pub trait Registers<Op: Operation>: Registry {}

/// Declares an operation registry and one marker type per operation.
///
/// Operation names must be distinct; declaring the same name twice is a compile error.
///
/// ```
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// pub struct CreateUserInput {
///     pub name: String,
/// }
///
/// #[derive(Serialize, Deserialize)]
/// pub struct CreateUserOutput {
///     pub id: String,
/// }
///
/// firebase_typed_caller::operation_registry! {
///     pub struct UserFunctions {
///         CreateUser("createUser"): CreateUserInput => CreateUserOutput,
///     }
/// }
///
/// use firebase_typed_caller::functions::{Operation, Registry};
/// assert_eq!(CreateUser::NAME, "createUser");
/// assert_eq!(UserFunctions::OPERATIONS, &["createUser"]);
/// ```
///
/// ```compile_fail
/// firebase_typed_caller::operation_registry! {
///     pub struct Clashing {
///         First("sameName"): u32 => u32,
///         Second("sameName"): String => String,
///     }
/// }
/// ```
#[macro_export]
macro_rules! operation_registry {
    (
        $(#[$meta:meta])*
        $vis:vis struct $registry:ident {
            $(
                $(#[$op_meta:meta])*
                $op:ident ( $name:literal ) : $input:ty => $output:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default)]
        $vis struct $registry;

        impl $crate::functions::Registry for $registry {
            const OPERATIONS: &'static [&'static str] = &[$($name),*];
        }

        const _: () = assert!(
            $crate::functions::names_are_unique(&[$($name),*]),
            "operation_registry! declares the same operation name twice"
        );

        $(
            $(#[$op_meta])*
            #[derive(Clone, Copy, Debug, Default)]
            $vis struct $op;

            impl $crate::functions::Operation for $op {
                const NAME: &'static str = $name;
                type Input = $input;
                type Output = $output;
            }

            impl $crate::functions::Registers<$op> for $registry {}
        )*
    };
}

#[doc(hidden)]
pub const fn names_are_unique(names: &[&str]) -> bool {
    let mut i = 0;
    while i < names.len() {
        let mut j = i + 1;
        while j < names.len() {
            if same_name(names[i], names[j]) {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

const fn same_name(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value as JsonValue;

    crate::operation_registry! {
        struct Sample {
            Echo("echo"): JsonValue => JsonValue,
            Count("stats/count"): () => u64,
        }
    }

    fn name_of<Op: Operation>() -> &'static str {
        Op::NAME
    }

    fn assert_registered<R: Registers<Op>, Op: Operation>() {}

    #[test]
    fn macro_lists_operations_in_order() {
        assert_eq!(Sample::OPERATIONS, &["echo", "stats/count"]);
        assert_eq!(name_of::<Echo>(), "echo");
        assert_eq!(name_of::<Count>(), "stats/count");
        assert_registered::<Sample, Echo>();
        assert_registered::<Sample, Count>();
    }

    #[test]
    fn duplicate_names_are_detected() {
        assert!(names_are_unique(&[]));
        assert!(names_are_unique(&["echo", "stats/count", "ech"]));
        assert!(!names_are_unique(&["echo", "stats/count", "echo"]));
        assert!(!names_are_unique(&["a", "a"]));
    }

    #[test]
    fn contains_checks_names() {
        assert!(Sample::contains("echo"));
        assert!(!Sample::contains("Echo"));
        assert!(!Sample::contains("missing"));
    }
}
