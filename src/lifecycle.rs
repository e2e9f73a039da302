use alloc::{string::String, vec::Vec};
use tracing::{debug, error, info_span};

use crate::{
    component::Component,
    errors::LifecycleErrorKind,
    hooks::Transition,
    instance::{Instance, State},
    object::Object,
    Container,
};

fn component_of(instance: &Instance) -> Option<&dyn Component> {
    instance.object.as_ref().and_then(Object::component)
}

fn instance_error(instance: &Instance) -> String {
    String::from(instance.instance_id.as_str())
}

/// Keeps the last error, the replaced ones were already logged.
fn record(last: &mut Option<LifecycleErrorKind>, err: LifecycleErrorKind) {
    if let Some(prev) = last.replace(err) {
        debug!(id = prev.id(), "Superseded error");
    }
}

impl Container {
    /// Starts the config and log providers, then every instance in dependency order.
    ///
    /// With `ignore` the pass continues past failures and the last one is returned.
    /// Otherwise the first failure is returned immediately and later instances stay unstarted.
    /// After-all-started hooks run once the whole pass went through.
    ///
    /// # Errors
    /// Returns [`LifecycleErrorKind::Start`] with the failing instance.
    pub fn start(&self, ignore: bool) -> Result<(), LifecycleErrorKind> {
        let span = info_span!("start", container = self.id(), ignore);
        let _guard = span.enter();

        for object in self.inner.providers.objects() {
            if let Some(starter) = object.component().and_then(|component| component.as_starter()) {
                starter.start(ignore).map_err(|source| {
                    let err = LifecycleErrorKind::Start {
                        id: String::from(object.name()),
                        source,
                    };
                    error!("{}", err);
                    err
                })?;
            }
        }

        let mut order = self.resolve().order;
        let mut last = None;
        for instance in &mut order {
            debug!(type_id = %instance.type_id, instance_id = %instance.instance_id, "Start");
            self.fire_before(Transition::Start, instance);

            let object = instance.object.clone();
            if let Some(component) = object.as_ref().and_then(Object::component) {
                let result = component.as_starter().map_or(Ok(()), |starter| starter.start(ignore));
                match result {
                    Ok(()) => self.set_state(instance, State::Started),
                    Err(source) => {
                        let err = LifecycleErrorKind::Start {
                            id: instance_error(instance),
                            source,
                        };
                        error!("{}", err);
                        if !ignore {
                            return Err(err);
                        }
                        record(&mut last, err);
                    }
                }
            }

            self.fire_after(Transition::Start, instance);
        }

        for instance in &order {
            if let Some(hook) = component_of(instance).and_then(|component| component.as_after_all_started()) {
                hook.after_all_started(self);
            }
        }

        last.map_or(Ok(()), Err)
    }

    /// Stops every instance in reverse dependency order, then the log and config providers.
    ///
    /// Before-all-stop hooks run first, in reverse order. Failures follow the `ignore` policy of [`Self::start`],
    /// instances stopped before a failure stay stopped.
    ///
    /// # Errors
    /// Returns [`LifecycleErrorKind::Stop`] with the failing instance.
    pub fn stop(&self, ignore: bool) -> Result<(), LifecycleErrorKind> {
        let span = info_span!("stop", container = self.id(), ignore);
        let _guard = span.enter();

        let mut order = self.resolve().order;
        for instance in order.iter().rev() {
            if let Some(hook) = component_of(instance).and_then(|component| component.as_before_all_stop()) {
                hook.before_all_stop(self);
            }
        }

        let mut last = None;
        for instance in order.iter_mut().rev() {
            debug!(type_id = %instance.type_id, instance_id = %instance.instance_id, "Stop");
            self.fire_before(Transition::Stop, instance);

            let object = instance.object.clone();
            if let Some(component) = object.as_ref().and_then(Object::component) {
                let result = component.as_stopper().map_or(Ok(()), |stopper| stopper.stop(ignore));
                match result {
                    Ok(()) => self.set_state(instance, State::Stopped),
                    Err(source) => {
                        let err = LifecycleErrorKind::Stop {
                            id: instance_error(instance),
                            source,
                        };
                        error!("{}", err);
                        if !ignore {
                            return Err(err);
                        }
                        record(&mut last, err);
                    }
                }
            }

            self.fire_after(Transition::Stop, instance);
        }

        for object in self.inner.providers.objects().iter().rev() {
            if let Some(stopper) = object.component().and_then(|component| component.as_stopper()) {
                if let Err(source) = stopper.stop(ignore) {
                    let err = LifecycleErrorKind::Stop {
                        id: String::from(object.name()),
                        source,
                    };
                    error!("{}", err);
                    record(&mut last, err);
                }
            }
        }

        last.map_or(Ok(()), Err)
    }

    /// Destroys every instance in reverse dependency order, then the log and config providers.
    ///
    /// After-all-destroyed hooks run after the instance pass, which a failure without `ignore` never reaches.
    ///
    /// # Errors
    /// Returns [`LifecycleErrorKind::Destroy`] with the failing instance.
    pub fn destroy(&self, ignore: bool) -> Result<(), LifecycleErrorKind> {
        let span = info_span!("destroy", container = self.id(), ignore);
        let _guard = span.enter();

        let mut order = self.resolve().order;
        let mut last = None;
        let mut after_all = Vec::new();
        for (index, instance) in order.iter_mut().enumerate().rev() {
            debug!(type_id = %instance.type_id, instance_id = %instance.instance_id, "Destroy");
            self.fire_before(Transition::Destroy, instance);

            let object = instance.object.clone();
            if let Some(component) = object.as_ref().and_then(Object::component) {
                let result = component.as_destroyer().map_or(Ok(()), |destroyer| destroyer.destroy(ignore));
                match result {
                    Ok(()) => self.set_state(instance, State::Destroyed),
                    Err(source) => {
                        let err = LifecycleErrorKind::Destroy {
                            id: instance_error(instance),
                            source,
                        };
                        error!("{}", err);
                        if !ignore {
                            return Err(err);
                        }
                        record(&mut last, err);
                    }
                }
                if component.as_after_all_destroyed().is_some() {
                    after_all.push(index);
                }
            }

            self.fire_after(Transition::Destroy, instance);
        }

        for index in after_all {
            if let Some(hook) = component_of(&order[index]).and_then(|component| component.as_after_all_destroyed()) {
                hook.after_all_destroyed(self);
            }
        }

        for object in self.inner.providers.objects().iter().rev() {
            if let Some(destroyer) = object.component().and_then(|component| component.as_destroyer()) {
                if let Err(source) = destroyer.destroy(ignore) {
                    let err = LifecycleErrorKind::Destroy {
                        id: String::from(object.name()),
                        source,
                    };
                    error!("{}", err);
                    record(&mut last, err);
                }
            }
        }

        last.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        component::{AfterAllDestroyed, AfterAllStarted, BeforeAllStop, Component, Destroyer, Starter, Stopper},
        config::{ConfigProvider, JsonConfig},
        errors::LifecycleErrorKind,
        instance::State,
        metadata::{Metadata, TypeInstances},
        object::Object,
        Container, Instance,
    };

    use alloc::{
        format,
        string::{String, ToString as _},
        sync::Arc,
        vec,
        vec::Vec,
    };
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use tracing_test::traced_test;

    type Calls = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        fails: bool,
        calls: Calls,
    }

    impl Recorder {
        fn call(&self, step: &str) -> anyhow::Result<()> {
            self.calls.lock().push(format!("{step} {}", self.name));
            if self.fails {
                anyhow::bail!("{step} of {} failed", self.name);
            }
            Ok(())
        }
    }

    impl Starter for Recorder {
        fn start(&self, _ignore: bool) -> anyhow::Result<()> {
            self.call("start")
        }
    }

    impl AfterAllStarted for Recorder {
        fn after_all_started(&self, _container: &Container) {
            self.calls.lock().push(format!("all started {}", self.name));
        }
    }

    impl BeforeAllStop for Recorder {
        fn before_all_stop(&self, _container: &Container) {
            self.calls.lock().push(format!("before stop {}", self.name));
        }
    }

    impl Stopper for Recorder {
        fn stop(&self, _ignore: bool) -> anyhow::Result<()> {
            self.call("stop")
        }
    }

    impl Destroyer for Recorder {
        fn destroy(&self, _ignore: bool) -> anyhow::Result<()> {
            self.call("destroy")
        }
    }

    impl AfterAllDestroyed for Recorder {
        fn after_all_destroyed(&self, _container: &Container) {
            self.calls.lock().push(format!("all destroyed {}", self.name));
        }
    }

    impl Component for Recorder {
        fn as_starter(&self) -> Option<&dyn Starter> {
            Some(self)
        }

        fn as_after_all_started(&self) -> Option<&dyn AfterAllStarted> {
            Some(self)
        }

        fn as_before_all_stop(&self) -> Option<&dyn BeforeAllStop> {
            Some(self)
        }

        fn as_stopper(&self) -> Option<&dyn Stopper> {
            Some(self)
        }

        fn as_destroyer(&self) -> Option<&dyn Destroyer> {
            Some(self)
        }

        fn as_after_all_destroyed(&self) -> Option<&dyn AfterAllDestroyed> {
            Some(self)
        }
    }

    struct RecordingConfig {
        inner: JsonConfig,
        recorder: Recorder,
    }

    impl ConfigProvider for RecordingConfig {
        fn config_file(&self) -> Option<PathBuf> {
            self.inner.config_file()
        }

        fn raw(&self) -> Option<serde_json::Value> {
            self.inner.raw()
        }
    }

    impl Component for RecordingConfig {
        fn as_starter(&self) -> Option<&dyn Starter> {
            Some(&self.recorder)
        }

        fn as_stopper(&self) -> Option<&dyn Stopper> {
            Some(&self.recorder)
        }

        fn as_destroyer(&self) -> Option<&dyn Destroyer> {
            Some(&self.recorder)
        }
    }

    /// `a` ← `b` ← `c`, `failing` names the recorder that fails every step.
    fn chain(calls: &Calls, failing: Option<&'static str>) -> Container {
        let container = Container::builder()
            .config_provider(RecordingConfig {
                inner: JsonConfig::default(),
                recorder: Recorder {
                    name: "config",
                    fails: false,
                    calls: calls.clone(),
                },
            })
            .without_log_provider()
            .build();

        container
            .pre_add(vec![TypeInstances::new(Metadata::new("recorder"))
                .with_instance(Instance::new("recorder", "a"))
                .with_instance(Instance::new("recorder", "b").with_dependency("a", "a"))
                .with_instance(Instance::new("recorder", "c").with_dependency("b", "b"))])
            .unwrap();
        for name in ["a", "b", "c"] {
            let recorder = Recorder {
                name,
                fails: failing == Some(name),
                calls: calls.clone(),
            };
            container.replace_or_add_by_instance_id(Object::new(recorder), name);
        }
        container
    }

    fn take(calls: &Calls) -> Vec<String> {
        core::mem::take(&mut *calls.lock())
    }

    #[test]
    #[traced_test]
    fn test_start_ignore_continues() {
        let calls = Calls::default();
        let container = chain(&calls, Some("b"));

        let err = container.start(true).unwrap_err();
        assert!(matches!(err, LifecycleErrorKind::Start { ref id, .. } if id == "b"));
        assert_eq!(
            take(&calls),
            ["start config", "start a", "start b", "start c", "all started a", "all started b", "all started c"]
        );
        assert_eq!(container.instance(&"b".into()).unwrap().state, State::Created);
        assert_eq!(container.instance(&"c".into()).unwrap().state, State::Started);
    }

    #[test]
    #[traced_test]
    fn test_start_fail_fast() {
        let calls = Calls::default();
        let container = chain(&calls, Some("b"));

        let err = container.start(false).unwrap_err();
        assert_eq!(err.id(), "b");
        assert_eq!(take(&calls), ["start config", "start a", "start b"]);
        assert_eq!(container.instance(&"c".into()).unwrap().state, State::Created);
    }

    #[test]
    #[traced_test]
    fn test_stop_reverses_start() {
        let calls = Calls::default();
        let container = chain(&calls, None);

        container.start(false).unwrap();
        let started: Vec<String> = take(&calls)
            .into_iter()
            .filter_map(|call| call.strip_prefix("start ").map(ToString::to_string))
            .collect();

        container.stop(false).unwrap();
        let calls_after_stop = take(&calls);
        assert_eq!(calls_after_stop[..3], ["before stop c", "before stop b", "before stop a"]);

        let mut stopped: Vec<String> = calls_after_stop
            .into_iter()
            .filter_map(|call| call.strip_prefix("stop ").map(ToString::to_string))
            .collect();
        assert_eq!(stopped.pop().as_deref(), Some("config"));
        stopped.reverse();
        assert_eq!(started[1..], stopped[..]);
        assert_eq!(container.instance(&"a".into()).unwrap().state, State::Stopped);
    }

    #[test]
    #[traced_test]
    fn test_stop_recomputes_order() {
        let calls = Calls::default();
        let container = chain(&calls, None);

        container.start(false).unwrap();
        container.remove_by_instance_id(&"b".into()).unwrap();
        take(&calls);

        container.stop(false).unwrap();
        let stopped: Vec<String> = take(&calls).into_iter().filter(|call| call.starts_with("stop ")).collect();
        // `c` lost its dependency and is ordered last as unresolved, so it's stopped first.
        assert_eq!(stopped, ["stop c", "stop a", "stop config"]);
    }

    #[test]
    #[traced_test]
    fn test_stop_fail_fast_keeps_stopped() {
        let calls = Calls::default();
        let container = chain(&calls, Some("b"));
        let _ = container.start(true);
        take(&calls);

        let err = container.stop(false).unwrap_err();
        assert!(matches!(err, LifecycleErrorKind::Stop { ref id, .. } if id == "b"));
        let stopped: Vec<String> = take(&calls).into_iter().filter(|call| call.starts_with("stop ")).collect();
        assert_eq!(stopped, ["stop c", "stop b"]);
        assert_eq!(container.instance(&"c".into()).unwrap().state, State::Stopped);
    }

    #[test]
    #[traced_test]
    fn test_stop_ignore_continues() {
        let calls = Calls::default();
        let container = chain(&calls, Some("b"));
        let _ = container.start(true);
        take(&calls);

        let err = container.stop(true).unwrap_err();
        assert!(matches!(err, LifecycleErrorKind::Stop { ref id, .. } if id == "b"));
        let stopped: Vec<String> = take(&calls).into_iter().filter(|call| call.starts_with("stop ")).collect();
        assert_eq!(stopped, ["stop c", "stop b", "stop a", "stop config"]);
        assert_eq!(container.instance(&"a".into()).unwrap().state, State::Stopped);
        assert_eq!(container.instance(&"b".into()).unwrap().state, State::Created);
    }

    #[test]
    #[traced_test]
    fn test_destroy() {
        let calls = Calls::default();
        let container = chain(&calls, Some("a"));

        let err = container.destroy(false).unwrap_err();
        assert_eq!(err.id(), "a");
        assert!(!take(&calls).iter().any(|call| call.starts_with("all destroyed")));

        let err = container.destroy(true).unwrap_err();
        assert!(matches!(err, LifecycleErrorKind::Destroy { .. }));
        assert_eq!(
            take(&calls),
            [
                "destroy c",
                "destroy b",
                "destroy a",
                "all destroyed c",
                "all destroyed b",
                "all destroyed a",
                "destroy config"
            ]
        );
        assert_eq!(container.instance(&"b".into()).unwrap().state, State::Destroyed);
    }
}
