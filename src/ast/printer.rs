//! Renders modules as Groovy-like source text.
//!
//! Output is stable: members print in arena order and indentation is four
//! spaces, so printed modules can be diffed between phases.

use super::{
    AnnotationId, Ast, BinaryOp, ClassId, Constant, CtorKind, Expr, MethodId, ModuleId, NodeRef,
    Stmt,
};
use std::fmt::Write as _;

const INDENT: &str = "    ";

pub fn print_module(ast: &Ast, module: ModuleId) -> String {
    let mut printer = Printer::new(ast);
    printer.module(module);
    printer.out
}

pub fn print_class(ast: &Ast, class: ClassId) -> String {
    let mut printer = Printer::new(ast);
    printer.class(class);
    printer.out
}

pub fn print_stmt(stmt: &Stmt) -> String {
    let ast = Ast::new();
    let mut printer = Printer::new(&ast);
    printer.stmt(stmt);
    printer.out
}

pub fn print_expr(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr);
    out
}

struct Printer<'a> {
    ast: &'a Ast,
    out: String,
    depth: usize,
}

impl<'a> Printer<'a> {
    fn new(ast: &'a Ast) -> Self {
        Self {
            ast,
            out: String::new(),
            depth: 0,
        }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn module(&mut self, module: ModuleId) {
        let node = self.ast.module(module);
        if let Some(pkg) = &node.package {
            self.line(&format!("package {}", pkg));
            self.out.push('\n');
        }
        for (i, class) in node.classes.iter().enumerate() {
            if i > 0 {
                self.out.push('\n');
            }
            self.class(*class);
        }
    }

    fn annotations(&mut self, ids: &[AnnotationId]) {
        for id in ids {
            let text = self.ast.annotation(*id).to_string();
            self.line(&text);
        }
    }

    fn class(&mut self, class: ClassId) {
        let ast = self.ast;
        let node = ast.class(class);
        self.annotations(&node.annotations);

        let keyword = if node.is_interface() { "interface" } else { "class" };
        let mods = node
            .modifiers
            .without(super::Modifiers::INTERFACE)
            .without(super::Modifiers::ANNOTATION);
        let mut header = String::new();
        if !mods.keywords().is_empty() {
            let _ = write!(header, "{} ", mods);
        }
        let _ = write!(header, "{} {}", keyword, node.simple_name());
        if let Some(sup) = &node.superclass {
            let _ = write!(header, " extends {}", sup.short());
        }
        if !node.interfaces.is_empty() {
            let names: Vec<String> = node.interfaces.iter().map(|i| i.short()).collect();
            let verb = if node.is_interface() { "extends" } else { "implements" };
            let _ = write!(header, " {} {}", verb, names.join(", "));
        }
        header.push_str(" {");
        self.line(&header);
        self.depth += 1;

        for field in ast.plain_fields(class) {
            let f = ast.field(field);
            self.annotations(&f.annotations);
            let mut text = format!("{} {} {}", f.modifiers, f.ty.short(), f.name);
            if let Some(init) = &f.init {
                text.push_str(" = ");
                write_expr(&mut text, init);
            }
            self.line(text.trim_start());
        }
        for prop in &node.properties {
            let p = ast.property(*prop);
            let f = ast.field(p.field);
            self.annotations(&f.annotations);
            let mods = p.modifiers.without(super::Modifiers::PUBLIC);
            let mut text = if mods.keywords().is_empty() {
                format!("{} {}", f.ty.short(), p.name)
            } else {
                format!("{} {} {}", mods, f.ty.short(), p.name)
            };
            if let Some(init) = &f.init {
                text.push_str(" = ");
                write_expr(&mut text, init);
            }
            self.line(&text);
        }
        for init in &node.static_initializers {
            self.line("static {");
            self.depth += 1;
            self.body(init);
            self.depth -= 1;
            self.line("}");
        }
        for init in &node.object_initializers {
            self.line("{");
            self.depth += 1;
            self.body(init);
            self.depth -= 1;
            self.line("}");
        }
        for method in node.constructors.iter().chain(node.methods.iter()) {
            self.out.push('\n');
            self.method(*method);
        }

        self.depth -= 1;
        self.line("}");
    }

    fn method(&mut self, method: MethodId) {
        let ast = self.ast;
        let node = ast.method(method);
        self.annotations(&node.annotations);
        let params: Vec<String> = node
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let mut text = String::new();
                for anno in ast.annotations_of(NodeRef::Parameter(method, i)) {
                    let _ = write!(text, "{} ", ast.annotation(*anno));
                }
                let _ = write!(text, "{} {}", p.ty.short(), p.name);
                if let Some(default) = &p.default {
                    text.push_str(" = ");
                    write_expr(&mut text, default);
                }
                text
            })
            .collect();
        let mut header = String::new();
        if !node.modifiers.keywords().is_empty() {
            let _ = write!(header, "{} ", node.modifiers);
        }
        if node.is_constructor() {
            let _ = write!(header, "{}", ast.class(node.owner).simple_name());
        } else {
            let _ = write!(header, "{} {}", node.return_type.short(), node.name);
        }
        let _ = write!(header, "({})", params.join(", "));
        match &node.body {
            None => self.line(&header),
            Some(body) => {
                header.push_str(" {");
                self.line(&header);
                self.depth += 1;
                self.body(body);
                self.depth -= 1;
                self.line("}");
            }
        }
    }

    fn body(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(stmts) => {
                for s in stmts {
                    self.stmt(s);
                }
            }
            Stmt::Empty => {}
            other => self.stmt(other),
        }
    }

    fn nested(&mut self, head: &str, body: &Stmt) {
        self.line(&format!("{} {{", head));
        self.depth += 1;
        self.body(body);
        self.depth -= 1;
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(_) => {
                self.line("{");
                self.depth += 1;
                self.body(stmt);
                self.depth -= 1;
                self.line("}");
            }
            Stmt::Expr(e) => self.line(&print_expr(e)),
            Stmt::Return(None) => self.line("return"),
            Stmt::Return(Some(e)) => self.line(&format!("return {}", print_expr(e))),
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                self.nested(&format!("if ({})", print_expr(cond)), then);
                match otherwise {
                    Some(other) => {
                        self.line("} else {");
                        self.depth += 1;
                        self.body(other);
                        self.depth -= 1;
                        self.line("}");
                    }
                    None => self.line("}"),
                }
            }
            Stmt::While { cond, body } => {
                self.nested(&format!("while ({})", print_expr(cond)), body);
                self.line("}");
            }
            Stmt::DoWhile { body, cond } => {
                self.nested("do", body);
                self.line(&format!("}} while ({})", print_expr(cond)));
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => {
                let part = |e: &Option<Expr>| e.as_ref().map(print_expr).unwrap_or_default();
                let head = format!("for ({}; {}; {})", part(init), part(cond), part(update));
                self.nested(&head, body);
                self.line("}");
            }
            Stmt::ForEach {
                var,
                iterable,
                body,
            } => {
                self.nested(&format!("for ({} in {})", var, print_expr(iterable)), body);
                self.line("}");
            }
            Stmt::Throw(e) => self.line(&format!("throw {}", print_expr(e))),
            Stmt::Synchronized { lock, body } => {
                self.nested(&format!("synchronized ({})", print_expr(lock)), body);
                self.line("}");
            }
            Stmt::Break => self.line("break"),
            Stmt::Continue => self.line("continue"),
            Stmt::Empty => {}
        }
    }
}

fn write_args(out: &mut String, args: &[Expr]) {
    out.push('(');
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_expr(out, arg);
    }
    out.push(')');
}

fn write_operand(out: &mut String, expr: &Expr) {
    let wrap = matches!(
        expr,
        Expr::Binary { .. } | Expr::Ternary { .. } | Expr::Assign { .. } | Expr::Cast { .. }
    );
    if wrap {
        out.push('(');
    }
    write_expr(out, expr);
    if wrap {
        out.push(')');
    }
}

fn write_expr(out: &mut String, expr: &Expr) {
    match expr {
        Expr::Constant(Constant::Str(s)) => {
            let _ = write!(out, "'{}'", s.replace('\'', "\\'"));
        }
        Expr::Constant(c) => {
            let _ = write!(out, "{}", c);
        }
        Expr::This => out.push_str("this"),
        Expr::Super => out.push_str("super"),
        Expr::Var(name) => out.push_str(name),
        Expr::ClassLit(ty) => {
            out.push_str(&ty.short());
        }
        Expr::Field { receiver, name } => {
            write_operand(out, receiver);
            let _ = write!(out, ".@{}", name);
        }
        Expr::Property {
            receiver,
            name,
            safe,
        } => {
            write_operand(out, receiver);
            out.push_str(if *safe { "?." } else { "." });
            out.push_str(name);
        }
        Expr::Call {
            receiver,
            method,
            args,
            implicit_this,
            safe,
        } => {
            if !*implicit_this {
                write_operand(out, receiver);
                out.push_str(if *safe { "?." } else { "." });
            }
            out.push_str(method);
            write_args(out, args);
        }
        Expr::StaticCall {
            owner,
            method,
            args,
        } => {
            let _ = write!(out, "{}.{}", owner.short(), method);
            write_args(out, args);
        }
        Expr::New { ty, args } => {
            let _ = write!(out, "new {}", ty.short());
            write_args(out, args);
        }
        Expr::NewArray { element, items } => {
            let _ = write!(out, "new {}[] {{", element.short());
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(out, item);
            }
            out.push('}');
        }
        Expr::CtorCall { kind, args } => {
            out.push_str(match kind {
                CtorKind::This => "this",
                CtorKind::Super => "super",
            });
            write_args(out, args);
        }
        Expr::Binary { op, left, right } => {
            write_operand(out, left);
            let _ = write!(out, " {} ", op.symbol());
            if *op == BinaryOp::Is {
                write_expr(out, right);
            } else {
                write_operand(out, right);
            }
        }
        Expr::Not(e) => {
            out.push('!');
            let wrap = !matches!(**e, Expr::Var(_) | Expr::Call { .. } | Expr::Property { .. });
            if wrap {
                out.push('(');
            }
            write_expr(out, e);
            if wrap {
                out.push(')');
            }
        }
        Expr::Ternary {
            cond,
            then,
            otherwise,
        } => {
            write_operand(out, cond);
            out.push_str(" ? ");
            write_operand(out, then);
            out.push_str(" : ");
            write_operand(out, otherwise);
        }
        Expr::Cast { ty, expr } => {
            let _ = write!(out, "({}) ", ty.short());
            write_operand(out, expr);
        }
        Expr::InstanceOf { expr, ty } => {
            write_operand(out, expr);
            let _ = write!(out, " instanceof {}", ty.short());
        }
        Expr::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(out, item);
            }
            out.push(']');
        }
        Expr::Map(entries) => {
            if entries.is_empty() {
                out.push_str("[:]");
                return;
            }
            out.push('[');
            for (i, entry) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(out, &entry.key);
                out.push_str(": ");
                write_expr(out, &entry.value);
            }
            out.push(']');
        }
        Expr::Index { receiver, index } => {
            write_operand(out, receiver);
            out.push('[');
            write_expr(out, index);
            out.push(']');
        }
        Expr::Assign { target, value } => {
            write_expr(out, target);
            out.push_str(" = ");
            write_expr(out, value);
        }
        Expr::Declare { ty, name, init } => {
            let _ = write!(out, "{} {}", ty.short(), name);
            if let Some(init) = init {
                out.push_str(" = ");
                write_expr(out, init);
            }
        }
        Expr::Closure { params, body } => {
            out.push_str("{ ");
            if !params.is_empty() {
                let _ = write!(out, "{} -> ", params.join(", "));
            }
            let printed = print_stmt(body);
            let inline: Vec<&str> = printed.lines().map(str::trim).collect();
            out.push_str(&inline.join("; "));
            out.push_str(" }");
        }
    }
}
