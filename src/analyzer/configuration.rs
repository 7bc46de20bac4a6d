//! Configuration-side classifiers: options, annotated options, choice
//! generators and loggers. Only units under `gov.nasa.jpf` are classified.

use super::{AnalyzerFamily, Classifier, HeuristicAnalyzer, Subject, or_unknown, strip_tokens};
use crate::facts::{ChoiceGenerator, ConfigAnnotation, ConfigOption, Fact, LoggerConfig};

pub const JPF_PREFIX: &str = "gov.nasa.jpf";

pub fn configuration_analyzer() -> HeuristicAnalyzer {
    HeuristicAnalyzer::new(AnalyzerFamily::Configuration, in_scope)
        .with_classifier(CONFIG_OPTION)
        .with_classifier(CONFIG_ANNOTATION)
        .with_classifier(CHOICE_GENERATOR)
        .with_classifier(LOGGER)
}

fn in_scope(class_name: &str) -> bool {
    class_name.starts_with(JPF_PREFIX)
}

pub const CONFIG_OPTION: Classifier = Classifier {
    label: "config-option",
    matches: names_option,
    build: build_config_option,
};

pub const CONFIG_ANNOTATION: Classifier = Classifier {
    label: "config-annotation",
    matches: names_annotation,
    build: build_config_annotation,
};

pub const CHOICE_GENERATOR: Classifier = Classifier {
    label: "choice-generator",
    matches: names_choice_generator,
    build: build_choice_generator,
};

pub const LOGGER: Classifier = Classifier {
    label: "logger",
    matches: names_logger,
    build: build_logger,
};

fn names_option(s: &Subject<'_>) -> bool {
    s.name_contains_any(&["Config", "Option", "Event"])
}

fn names_annotation(s: &Subject<'_>) -> bool {
    s.name_contains_any(&["Option", "Config"])
}

fn names_choice_generator(s: &Subject<'_>) -> bool {
    s.name_contains_any(&["ChoiceGenerator", "Choice"])
}

fn names_logger(s: &Subject<'_>) -> bool {
    s.name_contains_any(&["Logger", "Log"])
}

/// `gov.nasa.jpf.SearchConfig` -> `search`; a name made only of the stripped
/// tokens becomes `unknown`.
pub fn option_name(simple_name: &str) -> String {
    or_unknown(strip_tokens(simple_name, &["Config", "Option", "JPF"]).to_lowercase())
}

fn build_config_option(s: &Subject<'_>) -> Fact {
    let name = option_name(s.simple_name());
    Fact::ConfigOption(ConfigOption {
        source_method: format!("get{name}Option"),
        name,
        class_name: s.class_name().to_string(),
        value_type: "String".to_string(),
        values: Vec::new(),
        comment: String::new(),
    })
}

fn build_config_annotation(s: &Subject<'_>) -> Fact {
    Fact::ConfigAnnotation(ConfigAnnotation {
        name: option_name(s.simple_name()),
        class_name: s.class_name().to_string(),
        value_type: "String".to_string(),
        value: "default".to_string(),
        comment: "JPF configuration option".to_string(),
        annotation_type: "JPFOption".to_string(),
    })
}

fn build_choice_generator(s: &Subject<'_>) -> Fact {
    Fact::ChoiceGenerator(ChoiceGenerator {
        name: or_unknown(strip_tokens(s.simple_name(), &["ChoiceGenerator", "Choice"])),
        class_name: s.class_name().to_string(),
        method_name: "generate".to_string(),
        generator_type: "ChoiceGenerator".to_string(),
    })
}

fn build_logger(s: &Subject<'_>) -> Fact {
    Fact::LoggerConfig(LoggerConfig {
        name: or_unknown(strip_tokens(s.simple_name(), &["Logger", "Log"])),
        class_name: s.class_name().to_string(),
        logger_type: "Logger".to_string(),
    })
}
