#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use composition_runtime::{
    Binding, CapabilityId, Component, ComponentBase, Entity, EntityManager, FactoryRegistry,
    RequiredComponent,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Shared, ordered record of lifecycle calls across components.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }
}

#[derive(Default)]
pub struct Counts {
    pub init: AtomicUsize,
    pub after_init: AtomicUsize,
    pub dispose: AtomicUsize,
}

impl Counts {
    pub fn get(&self) -> (usize, usize, usize) {
        (
            self.init.load(Ordering::SeqCst),
            self.after_init.load(Ordering::SeqCst),
            self.dispose.load(Ordering::SeqCst),
        )
    }
}

macro_rules! tracked_component {
    ($name:ident) => {
        pub struct $name {
            base: ComponentBase,
            pub journal: Journal,
            pub counts: Counts,
            pub saw_initialized: Mutex<Vec<bool>>,
        }

        impl $name {
            pub fn new(journal: Journal) -> Self {
                Self {
                    base: ComponentBase::named_after::<Self>(),
                    journal,
                    counts: Counts::default(),
                    saw_initialized: Mutex::new(Vec::new()),
                }
            }
        }

        impl Component for $name {
            fn base(&self) -> &ComponentBase { &self.base }

            fn init(&self, entity: &Entity, _registration: CapabilityId) {
                self.counts.init.fetch_add(1, Ordering::SeqCst);
                self.saw_initialized.lock().unwrap().push(entity.components_initialized());
                self.journal.record(concat!("init:", stringify!($name)));
            }

            fn after_init(&self) {
                self.counts.after_init.fetch_add(1, Ordering::SeqCst);
                if let Some(entity) = self.entity() {
                    self.saw_initialized.lock().unwrap().push(entity.components_initialized());
                }
                self.journal.record(concat!("after_init:", stringify!($name)));
            }

            fn dispose(&self) {
                self.counts.dispose.fetch_add(1, Ordering::SeqCst);
                self.journal.record(concat!("dispose:", stringify!($name)));
            }
        }
    };
}

tracked_component!(Alpha);
tracked_component!(Beta);
tracked_component!(Gamma);

/// Capability: something that can be locked.
pub trait Lock: Component {
    fn is_locked(&self) -> bool;
    fn set_locked(&self, locked: bool);
}

pub struct OakLock {
    base: ComponentBase,
    locked: AtomicBool,
    pub journal: Journal,
    pub counts: Counts,
}

impl OakLock {
    pub fn new(journal: Journal) -> Self {
        Self {
            base: ComponentBase::new("OakLock"),
            locked: AtomicBool::new(true),
            journal,
            counts: Counts::default(),
        }
    }
}

impl Lock for OakLock {
    fn is_locked(&self) -> bool { self.locked.load(Ordering::SeqCst) }
    fn set_locked(&self, locked: bool) { self.locked.store(locked, Ordering::SeqCst) }
}

impl Component for OakLock {
    fn base(&self) -> &ComponentBase { &self.base }

    fn init(&self, _entity: &Entity, _registration: CapabilityId) {
        self.counts.init.fetch_add(1, Ordering::SeqCst);
        self.journal.record("init:Lock");
    }

    fn after_init(&self) {
        self.counts.after_init.fetch_add(1, Ordering::SeqCst);
        self.journal.record("after_init:Lock");
    }

    fn dispose(&self) {
        self.counts.dispose.fetch_add(1, Ordering::SeqCst);
        self.journal.record("dispose:Lock");
    }
}

/// Capability: something that swings, provided the door is unlocked.
pub trait Hinge: Component {
    fn cached_lock(&self) -> Option<Arc<dyn Lock>>;
    fn can_swing(&self) -> bool;
}

pub struct BrassHinge {
    base: ComponentBase,
    clear_on_remove: bool,
    pub journal: Journal,
    pub cached: Arc<Mutex<Option<Arc<dyn Lock>>>>,
    pub added: Arc<AtomicUsize>,
    pub removed: Arc<AtomicUsize>,
    pub binding: OnceLock<Binding<dyn Lock>>,
}

impl BrassHinge {
    pub fn new(journal: Journal, clear_on_remove: bool) -> Self {
        Self {
            base: ComponentBase::new("BrassHinge"),
            clear_on_remove,
            journal,
            cached: Arc::new(Mutex::new(None)),
            added: Arc::new(AtomicUsize::new(0)),
            removed: Arc::new(AtomicUsize::new(0)),
            binding: OnceLock::new(),
        }
    }
}

impl Hinge for BrassHinge {
    fn cached_lock(&self) -> Option<Arc<dyn Lock>> { self.cached.lock().unwrap().clone() }

    fn can_swing(&self) -> bool {
        self.cached_lock().map_or(true, |lock| !lock.is_locked())
    }
}

impl Component for BrassHinge {
    fn base(&self) -> &ComponentBase { &self.base }

    fn required_components(&self) -> Vec<RequiredComponent> {
        vec![RequiredComponent::of::<dyn Lock>(true)]
    }

    fn init(&self, entity: &Entity, _registration: CapabilityId) {
        self.journal.record("init:Hinge");

        let (cache_added, cache_removed) = (Arc::clone(&self.cached), Arc::clone(&self.cached));
        let (added, removed) = (Arc::clone(&self.added), Arc::clone(&self.removed));
        let (journal_added, journal_removed) = (self.journal.clone(), self.journal.clone());
        let clear_on_remove = self.clear_on_remove;

        let binding = entity.bind::<dyn Lock, _, _>(
            move |lock| {
                added.fetch_add(1, Ordering::SeqCst);
                journal_added.record("hinge:lock_added");
                *cache_added.lock().unwrap() = Some(lock);
            },
            move |lock| {
                removed.fetch_add(1, Ordering::SeqCst);
                journal_removed.record(if lock.is_disposed() {
                    "hinge:lock_removed_disposed"
                } else {
                    "hinge:lock_removed_live"
                });
                if clear_on_remove {
                    *cache_removed.lock().unwrap() = None;
                }
            },
        );
        let _ = self.binding.set(binding);
    }

    fn after_init(&self) { self.journal.record("after_init:Hinge"); }

    fn dispose(&self) { self.journal.record("dispose:Hinge"); }
}

/// Registry wired with every fixture component, and a counter of factory
/// invocations per capability name.
pub struct Fixture {
    pub journal: Journal,
    pub registry: Arc<FactoryRegistry>,
    pub created: Arc<Mutex<Vec<String>>>,
}

impl Fixture {
    pub fn new(clear_on_remove: bool) -> Self {
        init_tracing();
        let journal = Journal::default();
        let registry = Arc::new(FactoryRegistry::new());
        let created = Arc::new(Mutex::new(Vec::new()));

        {
            let (j, c) = (journal.clone(), Arc::clone(&created));
            registry
                .register::<dyn Lock, _>(move || {
                    c.lock().unwrap().push("Lock".to_owned());
                    Arc::new(OakLock::new(j.clone())) as Arc<dyn Lock>
                })
                .unwrap();
        }
        {
            let (j, c) = (journal.clone(), Arc::clone(&created));
            registry
                .register::<dyn Hinge, _>(move || {
                    c.lock().unwrap().push("Hinge".to_owned());
                    Arc::new(BrassHinge::new(j.clone(), clear_on_remove)) as Arc<dyn Hinge>
                })
                .unwrap();
        }
        {
            let (j, c) = (journal.clone(), Arc::clone(&created));
            registry
                .register::<Alpha, _>(move || {
                    c.lock().unwrap().push("Alpha".to_owned());
                    Arc::new(Alpha::new(j.clone()))
                })
                .unwrap();
        }
        {
            let (j, c) = (journal.clone(), Arc::clone(&created));
            registry
                .register::<Beta, _>(move || {
                    c.lock().unwrap().push("Beta".to_owned());
                    Arc::new(Beta::new(j.clone()))
                })
                .unwrap();
        }
        {
            let (j, c) = (journal.clone(), Arc::clone(&created));
            registry
                .register::<Gamma, _>(move || {
                    c.lock().unwrap().push("Gamma".to_owned());
                    Arc::new(Gamma::new(j.clone()))
                })
                .unwrap();
        }

        Self { journal, registry, created }
    }

    pub fn manager(&self) -> EntityManager {
        EntityManager::new(Arc::clone(&self.registry) as Arc<dyn composition_runtime::CapabilityFactory>)
    }

    pub fn created(&self, name: &str) -> usize {
        self.created.lock().unwrap().iter().filter(|n| *n == name).count()
    }
}
