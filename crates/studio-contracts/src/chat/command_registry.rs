#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "ratio",
        action: "resume_deferred",
    },
    CommandSpec {
        command: "speak",
        action: "speak",
    },
];

pub(crate) const ATTRIBUTE_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "extract",
        action: "extract_reference",
    },
    CommandSpec {
        command: "forget",
        action: "clear_reference",
    },
    CommandSpec {
        command: "keep",
        action: "keep_attribute",
    },
    CommandSpec {
        command: "change",
        action: "change_attribute",
    },
];

pub(crate) const MULTI_PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "attach",
    action: "attach",
}];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "reset",
        action: "reset_memory",
    },
    CommandSpec {
        command: "memory",
        action: "show_memory",
    },
    CommandSpec {
        command: "pending",
        action: "show_pending",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub(crate) const REFERENCE_COMMAND: CommandSpec = CommandSpec {
    command: "reference",
    action: "set_reference",
};

pub(crate) const RESIZE_COMMAND: CommandSpec = CommandSpec {
    command: "resize",
    action: "resize",
};

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/attach <paths...>",
    "/ratio <ratio>",
    "/resize <ratio> [scene...]",
    "/reference <attribute> <path>",
    "/extract <attribute>",
    "/forget <attribute>",
    "/reset",
    "/keep <attribute>",
    "/change <attribute>",
    "/memory",
    "/pending",
    "/speak <text>",
    "/help",
    "/quit",
];
