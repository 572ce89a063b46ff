use proc_macro2::TokenStream;
use quote::{quote, ToTokens};
use regex_nfa_compiler::{compile, Automaton, Label, Transition};
use syn::{parse_macro_input, LitStr};

/// Compiles a regular expression to its canonical NFA at build time.
///
/// ```ignore
/// let nfa = nfa!("(a|b)*c");
/// assert!(nfa.accepts("abac"));
/// ```
///
/// Expands to an expression of type `regex_nfa_compiler::Automaton`. An
/// invalid expression is reported as a compile error on the literal.
#[proc_macro]
pub fn nfa(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let literal = parse_macro_input!(input as LitStr);
    expand(&literal)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Runs the pipeline on the literal; errors are spanned at the literal.
fn expand(literal: &LitStr) -> syn::Result<TokenStream> {
    let compiled =
        compile(&literal.value()).map_err(|err| syn::Error::new(literal.span(), err))?;
    Ok(GenAutomaton(compiled.automaton()).to_token_stream())
}

struct GenAutomaton<'a>(&'a Automaton);

impl ToTokens for GenAutomaton<'_> {
    fn to_tokens(&self, tokens: &mut TokenStream) {
        let automaton = self.0;
        let states = automaton.states();
        let alphabet = automaton.alphabet().iter();
        let transitions = automaton.transitions().iter().map(GenTransition);
        let initial = *automaton.initial();
        let finals = automaton.finals();

        tokens.extend(quote! {
            ::regex_nfa_compiler::Automaton::from_parts(
                ::std::vec![#(#states),*],
                [#(#alphabet),*],
                ::std::vec![#(#transitions),*],
                #initial,
                ::std::vec![#(#finals),*],
            )
        });
    }
}

struct GenTransition<'a>(&'a Transition);

impl ToTokens for GenTransition<'_> {
    fn to_tokens(&self, tokens: &mut TokenStream) {
        let Transition { from, label, to } = *self.0;
        let label = match label {
            Label::Epsilon => quote! { ::regex_nfa_compiler::Label::Epsilon },
            Label::Symbol(c) => quote! { ::regex_nfa_compiler::Label::Symbol(#c) },
        };

        tokens.extend(quote! {
            ::regex_nfa_compiler::Transition::new(#from, #label, #to)
        });
    }
}
