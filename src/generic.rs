use std::fmt;

use itertools::Itertools;
use rpds::{RedBlackTreeMap, Vector};
use tracing::debug;

use crate::{
    error::RuntimeError,
    value::{Callable, GenericStub, Value},
};

/// Requires the argument at `position` to be a struct with tag `tag`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMatcher {
    pub position: usize,
    pub tag: String,
}

impl TypeMatcher {
    pub fn new<T>(position: usize, tag: T) -> Self
    where
        T: Into<String>,
    {
        TypeMatcher {
            position,
            tag: tag.into(),
        }
    }
    pub fn matches(&self, args: &[Value]) -> bool {
        matches!(args.get(self.position), Some(Value::Struct(s)) if s.type_name == self.tag)
    }
}

#[derive(Debug, Clone)]
struct Instance {
    implementation: Callable,
    matchers: Vec<TypeMatcher>,
}

impl Instance {
    fn matches(&self, args: &[Value]) -> bool {
        self.matchers.iter().all(|matcher| matcher.matches(args))
    }
}

#[derive(Clone)]
struct GenericClass {
    /// Instances per operation, in registration order
    operations: RedBlackTreeMap<String, Vector<Instance>>,
}

/// The named classes of overloaded operations
///
/// Built from persistent maps, so cloning a registry is cheap and the clone
/// evolves independently.
#[derive(Clone, Default)]
pub struct GenericRegistry {
    classes: RedBlackTreeMap<String, GenericClass>,
    /// Operation name to the class that declares it
    owners: RedBlackTreeMap<String, String>,
}

impl GenericRegistry {
    pub fn new() -> Self {
        GenericRegistry::default()
    }
    /// Declare a class and the operations it groups
    ///
    /// An operation belongs to the first class that declares it for the
    /// lifetime of the registry. Redeclaring a class drops all of its
    /// instances, and it keeps every operation it already owned.
    pub fn register_class<N, O, S>(&mut self, name: N, operations: O) -> Result<(), RuntimeError>
    where
        N: Into<String>,
        O: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let mut operations: Vec<String> = operations.into_iter().map(Into::into).collect();
        for operation in &operations {
            match self.owners.get(operation) {
                Some(owner) if *owner != name => {
                    return Err(RuntimeError::OperationConflict {
                        operation: operation.clone(),
                        class: name,
                        owner: owner.clone(),
                    })
                }
                _ => {}
            }
        }
        if let Some(previous) = self.classes.get(&name) {
            operations.extend(previous.operations.keys().cloned());
        }
        for operation in &operations {
            self.owners = self.owners.insert(operation.clone(), name.clone());
        }
        debug!(class = %name, operations = ?operations, "registered generic class");
        let class = GenericClass {
            operations: operations
                .into_iter()
                .map(|operation| (operation, Vector::new()))
                .collect(),
        };
        self.classes = self.classes.insert(name, class);
        Ok(())
    }
    /// Add an implementation of one operation, tried after every
    /// implementation registered before it
    pub fn register_instance<M, T>(
        &mut self,
        class: &str,
        operation: &str,
        implementation: Callable,
        matchers: M,
    ) -> Result<(), RuntimeError>
    where
        M: IntoIterator<Item = (usize, T)>,
        T: Into<String>,
    {
        let generic_class = self
            .classes
            .get(class)
            .ok_or_else(|| RuntimeError::UnknownClass(class.into()))?;
        let instances =
            generic_class
                .operations
                .get(operation)
                .ok_or_else(|| RuntimeError::UnknownOperation {
                    class: class.into(),
                    operation: operation.into(),
                })?;
        let matchers: Vec<TypeMatcher> = matchers
            .into_iter()
            .map(|(position, tag)| TypeMatcher::new(position, tag))
            .collect();
        if matchers.is_empty() {
            return Err(RuntimeError::EmptyMatcher {
                operation: operation.into(),
            });
        }
        debug!(
            class,
            operation,
            index = instances.len(),
            matchers = ?matchers,
            "registered generic instance"
        );
        let instances = instances.push_back(Instance {
            implementation,
            matchers,
        });
        let updated = GenericClass {
            operations: generic_class
                .operations
                .insert(operation.into(), instances),
        };
        self.classes = self.classes.insert(class.into(), updated);
        Ok(())
    }
    /// Find the first instance of an operation whose matchers all accept
    /// the arguments
    pub fn resolve(
        &self,
        class: &str,
        operation: &str,
        args: &[Value],
    ) -> Result<Callable, RuntimeError> {
        let instances = self
            .classes
            .get(class)
            .ok_or_else(|| RuntimeError::UnknownClass(class.into()))?
            .operations
            .get(operation)
            .ok_or_else(|| RuntimeError::UnknownOperation {
                class: class.into(),
                operation: operation.into(),
            })?;
        match instances.iter().find_position(|instance| instance.matches(args)) {
            Some((index, instance)) => {
                debug!(class, operation, index, "resolved generic instance");
                Ok(instance.implementation.clone())
            }
            None => Err(RuntimeError::DispatchFailure {
                operation: operation.into(),
                args: args.iter().join(", "),
            }),
        }
    }
    /// The stub a variable lookup yields for a declared operation
    pub fn stub(&self, operation: &str) -> Option<GenericStub> {
        self.owners.get(operation).map(|class| GenericStub {
            class: class.clone(),
            operation: operation.into(),
        })
    }
}

impl fmt::Debug for GenericRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map()
            .entries(self.classes.iter().map(|(name, class)| {
                let operations: Vec<_> = class
                    .operations
                    .iter()
                    .map(|(operation, instances)| (operation, instances.len()))
                    .collect();
                (name, operations)
            }))
            .finish()
    }
}
